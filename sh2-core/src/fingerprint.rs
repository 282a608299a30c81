//! Identify the game build by hashing its executable.

use sha1::{Digest, Sha1};

use crate::profile::{KnownVersion, KNOWN_VERSIONS};

/// Uppercase hex SHA1 of `bytes`.
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(bytes))
}

/// Look a digest up in the table of known builds. Case-insensitive.
pub fn find_known_version(sha1: &str) -> Option<&'static KnownVersion> {
    KNOWN_VERSIONS.iter().find(|v| v.sha1.eq_ignore_ascii_case(sha1))
}

pub fn detect_version(executable: &[u8]) -> Option<&'static KnownVersion> {
    let digest = sha1_hex(executable);
    log::debug!("executable sha1: {}", digest);
    find_known_version(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_abc() {
        assert_eq!(sha1_hex(b"abc"), "A9993E364706816ABA3E25717850C26C9CD0D89D");
    }

    #[test]
    fn known_digest_maps_to_its_profile() {
        let version = find_known_version("3a27deddfa81cf30f46f0742c3523230cac75d9a").unwrap();
        assert_eq!(version.file_name, "SLUS_202.28");

        let profile = version.profile();
        assert_eq!(profile.data_offset, 0x2CCF00);
        assert_eq!(profile.magic_offset, 0xFF800);
    }

    #[test]
    fn unknown_executable_is_not_detected() {
        assert!(detect_version(b"definitely not a game").is_none());
        assert!(find_known_version("").is_none());
    }
}
