pub const NAMESPACE_PREFIX: &str = "packndocs_";

pub const HAS_ONBOARDED: &str = "packndocs_has_onboarded";
pub const TARGET_REGION: &str = "packndocs_target_region";
pub const SELECTED_COUNTRY: &str = "packndocs_selected_country";
pub const VISA_PURPOSE: &str = "packndocs_visa_purpose";
pub const TRAVEL_TIMELINE: &str = "packndocs_travel_timeline";

pub const PROGRESS_PREFIX: &str = "packndocs_progress_";

pub fn progress_key(country_id: &str) -> String {
    format!("{PROGRESS_PREFIX}{country_id}")
}

pub fn country_id_from_progress_key(key: &str) -> Option<&str> {
    key.strip_prefix(PROGRESS_PREFIX)
        .filter(|country_id| !country_id.is_empty())
}

pub fn is_app_key(key: &str) -> bool {
    key.starts_with(NAMESPACE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_keys_round_trip() {
        let key = progress_key("germany");
        assert_eq!(key, "packndocs_progress_germany");
        assert_eq!(country_id_from_progress_key(&key), Some("germany"));
        assert_eq!(country_id_from_progress_key(PROGRESS_PREFIX), None);
        assert_eq!(country_id_from_progress_key(SELECTED_COUNTRY), None);
    }

    #[test]
    fn every_key_shares_the_namespace() {
        for key in [
            HAS_ONBOARDED,
            TARGET_REGION,
            SELECTED_COUNTRY,
            VISA_PURPOSE,
            TRAVEL_TIMELINE,
        ] {
            assert!(is_app_key(key));
        }
        assert!(is_app_key(&progress_key("usa")));
        assert!(!is_app_key("other_app_setting"));
    }
}
