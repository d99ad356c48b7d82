//! Static per-platform limits and feature flags.

// self
use crate::{
	_prelude::*,
	adapters,
	error::ValidationError,
	platform::{Platform, PostContent},
};

/// Read-only descriptor of what a platform accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
	/// Maximum characters in the post text.
	pub max_text_length: usize,
	/// Maximum media attachments per post.
	pub max_media_count: usize,
	/// Whether image attachments are accepted.
	pub supports_images: bool,
	/// Whether video attachments are accepted.
	pub supports_video: bool,
	/// Whether a single post may carry several media items.
	pub supports_multi_media: bool,
	/// Whether the platform schedules posts natively.
	pub supports_scheduling: bool,
	/// Whether hashtags are rendered as links.
	pub supports_hashtags: bool,
	/// Largest accepted video in bytes.
	pub max_video_size: u64,
	/// Whether the platform issues refresh tokens at all.
	pub supports_refresh: bool,
}
impl PlatformCapabilities {
	/// Checks content against these limits; never performs I/O.
	///
	/// Only the text counts toward `max_text_length`; media and links do not reserve
	/// characters. Attachments are classified by extension, so video sizes are only known
	/// once the adapter fetches them.
	pub fn validate(&self, platform: Platform, content: &PostContent) -> Result<(), ValidationError> {
		if content.is_empty() {
			return Err(ValidationError::EmptyContent);
		}

		let length = content.text_length();

		if length > self.max_text_length {
			return Err(ValidationError::TextTooLong {
				platform,
				length,
				max: self.max_text_length,
			});
		}

		let count = content.media_urls.len();
		let max = if self.supports_multi_media { self.max_media_count } else { self.max_media_count.min(1) };

		if count > max {
			return Err(ValidationError::TooManyMedia { platform, count, max });
		}

		for url in &content.media_urls {
			let (kind, supported) = if adapters::is_video(url) {
				("video", self.supports_video)
			} else {
				("image", self.supports_images)
			};

			if !supported {
				return Err(ValidationError::UnsupportedMedia { platform, kind });
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const CAPS: PlatformCapabilities = PlatformCapabilities {
		max_text_length: 10,
		max_media_count: 2,
		supports_images: true,
		supports_video: false,
		supports_multi_media: true,
		supports_scheduling: false,
		supports_hashtags: true,
		max_video_size: 0,
		supports_refresh: false,
	};

	fn clip() -> Url {
		Url::parse("https://cdn.example.com/clip.mp4").expect("Media fixture URL should parse.")
	}

	fn media(count: usize) -> Vec<Url> {
		(0..count)
			.map(|idx| {
				Url::parse(&format!("https://cdn.example.com/{idx}.png"))
					.expect("Media fixture URL should parse.")
			})
			.collect()
	}

	#[test]
	fn text_limit_is_inclusive_and_counts_characters() {
		assert!(CAPS.validate(Platform::LinkedIn, &PostContent::text("0123456789")).is_ok());
		assert!(CAPS.validate(Platform::LinkedIn, &PostContent::text("ééééééééé✓")).is_ok());
		assert_eq!(
			CAPS.validate(Platform::LinkedIn, &PostContent::text("0123456789A")),
			Err(ValidationError::TextTooLong { platform: Platform::LinkedIn, length: 11, max: 10 })
		);
	}

	#[test]
	fn media_only_posts_pass_text_validation() {
		let content = PostContent::text("").with_media(media(2));

		assert!(CAPS.validate(Platform::LinkedIn, &content).is_ok());
	}

	#[test]
	fn media_count_and_empty_content_are_rejected() {
		let content = PostContent::text("hi").with_media(media(3));

		assert!(matches!(
			CAPS.validate(Platform::LinkedIn, &content),
			Err(ValidationError::TooManyMedia { count: 3, max: 2, .. })
		));

		let single = PlatformCapabilities { supports_multi_media: false, ..CAPS };

		assert!(matches!(
			single.validate(Platform::LinkedIn, &PostContent::text("hi").with_media(media(2))),
			Err(ValidationError::TooManyMedia { max: 1, .. })
		));
		assert_eq!(
			CAPS.validate(Platform::LinkedIn, &PostContent::text("")),
			Err(ValidationError::EmptyContent)
		);
	}

	#[test]
	fn unsupported_attachment_kinds_are_rejected() {
		assert_eq!(
			CAPS.validate(Platform::LinkedIn, &PostContent::text("hi").with_media(vec![clip()])),
			Err(ValidationError::UnsupportedMedia { platform: Platform::LinkedIn, kind: "video" })
		);

		let videos_only =
			PlatformCapabilities { supports_images: false, supports_video: true, ..CAPS };
		let video_post = PostContent::text("hi").with_media(vec![clip()]);

		assert!(videos_only.validate(Platform::Facebook, &video_post).is_ok());
		assert_eq!(
			videos_only.validate(Platform::Facebook, &PostContent::text("hi").with_media(media(1))),
			Err(ValidationError::UnsupportedMedia { platform: Platform::Facebook, kind: "image" })
		);
	}
}
