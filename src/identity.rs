//! Builds the run's identity bundle from CLI input and a stored profile

use optout_core_types::{fields, IdentityData};
use optout_state_center::ProfileState;

use crate::errors::ConfigurationError;

/// Identity values given on the command line.
#[derive(Clone, Debug, Default)]
pub struct IdentityInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl IdentityInput {
    fn pairs(&self) -> [(&'static str, Option<&str>); 8] {
        [
            (fields::FIRST_NAME, self.first_name.as_deref()),
            (fields::LAST_NAME, self.last_name.as_deref()),
            (fields::EMAIL, self.email.as_deref()),
            (fields::ZIP, self.zip.as_deref()),
            (fields::PHONE, self.phone.as_deref()),
            (fields::SSN, self.ssn.as_deref()),
            (fields::CITY, self.city.as_deref()),
            (fields::STATE, self.state.as_deref()),
        ]
    }
}

/// CLI values win over stored ones. Fails when any required field is
/// missing from both.
pub fn resolve_identity(
    input: &IdentityInput,
    stored: Option<&ProfileState>,
) -> Result<IdentityData, ConfigurationError> {
    let mut builder = IdentityData::builder();
    for (field, value) in input.pairs() {
        builder = builder.set_opt(field, value);
    }

    let state_from_cli = input
        .state
        .as_deref()
        .is_some_and(|state| !state.trim().is_empty());
    if let Some(stored) = stored {
        for (field, value) in &stored.identity {
            // a new state on the CLI invalidates the stored abbreviation
            if state_from_cli && field == fields::STATE_ABBREVIATION {
                continue;
            }
            builder = builder.set_default(field.as_str(), value.as_str());
        }
    }

    let identity = builder.build();
    let missing = identity.missing_required();
    if !missing.is_empty() {
        return Err(ConfigurationError::MissingIdentityFields(missing));
    }
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use optout_core_types::ProfileId;

    fn jane_input() -> IdentityInput {
        IdentityInput {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            email: Some("j@x.com".into()),
            zip: Some("94110".into()),
            ..IdentityInput::default()
        }
    }

    fn stored(pairs: &[(&str, &str)]) -> ProfileState {
        let mut state = ProfileState::empty(ProfileId::parse("jane").unwrap());
        for (field, value) in pairs {
            state.identity.insert(field.to_string(), value.to_string());
        }
        state
    }

    #[test]
    fn complete_cli_input_resolves() {
        let identity = resolve_identity(&jane_input(), None).unwrap();
        assert_eq!(identity.get("first_name"), Some("Jane"));
        assert_eq!(identity.get("zip"), Some("94110"));
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let input = IdentityInput {
            email: None,
            zip: Some("  ".into()),
            ..jane_input()
        };
        match resolve_identity(&input, None) {
            Err(ConfigurationError::MissingIdentityFields(missing)) => {
                assert_eq!(missing, vec!["email", "zip"])
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn stored_profile_fills_gaps_but_cli_wins() {
        let profile = stored(&[("email", "old@x.com"), ("phone", "555-0100")]);
        let input = IdentityInput {
            email: Some("new@x.com".into()),
            ..jane_input()
        };
        let identity = resolve_identity(&input, Some(&profile)).unwrap();
        assert_eq!(identity.get("email"), Some("new@x.com"));
        assert_eq!(identity.get("phone"), Some("555-0100"));
    }

    #[test]
    fn profile_alone_can_supply_everything() {
        let profile = stored(&[
            ("first_name", "Jane"),
            ("last_name", "Doe"),
            ("email", "j@x.com"),
            ("zip", "94110"),
        ]);
        let identity = resolve_identity(&IdentityInput::default(), Some(&profile)).unwrap();
        assert!(identity.missing_required().is_empty());
    }

    #[test]
    fn new_state_replaces_stored_abbreviation() {
        let profile = stored(&[("state", "Texas"), ("state_abbreviation", "TX")]);
        let input = IdentityInput {
            state: Some("California".into()),
            ..jane_input()
        };
        let identity = resolve_identity(&input, Some(&profile)).unwrap();
        assert_eq!(identity.get("state"), Some("California"));
        assert_eq!(identity.get("state_abbreviation"), Some("CA"));
    }
}
