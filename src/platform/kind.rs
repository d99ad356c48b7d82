//! Platform enumeration.

// self
use crate::_prelude::*;

/// External social platforms the broker knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
	/// X (formerly Twitter).
	Twitter,
	/// Facebook pages.
	Facebook,
	/// Instagram business accounts.
	Instagram,
	/// LinkedIn members.
	#[serde(rename = "linkedin")]
	LinkedIn,
	/// TikTok creators.
	#[serde(rename = "tiktok")]
	TikTok,
	/// YouTube channels.
	#[serde(rename = "youtube")]
	YouTube,
}
impl Platform {
	/// Every known platform.
	pub const ALL: [Platform; 6] = [
		Platform::Twitter,
		Platform::Facebook,
		Platform::Instagram,
		Platform::LinkedIn,
		Platform::TikTok,
		Platform::YouTube,
	];

	/// Returns a stable label suitable for storage, span, or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Platform::Twitter => "twitter",
			Platform::Facebook => "facebook",
			Platform::Instagram => "instagram",
			Platform::LinkedIn => "linkedin",
			Platform::TikTok => "tiktok",
			Platform::YouTube => "youtube",
		}
	}

	/// Human-readable platform name.
	pub const fn display_name(self) -> &'static str {
		match self {
			Platform::Twitter => "X",
			Platform::Facebook => "Facebook",
			Platform::Instagram => "Instagram",
			Platform::LinkedIn => "LinkedIn",
			Platform::TikTok => "TikTok",
			Platform::YouTube => "YouTube",
		}
	}
}
impl Display for Platform {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.display_name())
	}
}
impl FromStr for Platform {
	type Err = UnknownPlatform;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lowered = s.trim().to_ascii_lowercase();

		match lowered.as_str() {
			"x" => Ok(Platform::Twitter),
			other => Platform::ALL
				.into_iter()
				.find(|platform| platform.as_str() == other)
				.ok_or_else(|| UnknownPlatform(s.to_owned())),
		}
	}
}

/// Error returned when parsing an unknown platform label.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown platform `{0}`.")]
pub struct UnknownPlatform(pub String);

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_round_trip_through_parse_and_serde() {
		for platform in Platform::ALL {
			assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));

			let json = serde_json::to_string(&platform).expect("Platform should serialize.");

			assert_eq!(json, format!("\"{}\"", platform.as_str()));
		}
	}

	#[test]
	fn parse_accepts_aliases_and_rejects_unknown() {
		assert_eq!("X".parse::<Platform>(), Ok(Platform::Twitter));
		assert_eq!(" LinkedIn ".parse::<Platform>(), Ok(Platform::LinkedIn));
		assert!("myspace".parse::<Platform>().is_err());
	}
}
