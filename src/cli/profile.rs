use anyhow::Result;
use clap::{Args, Subcommand};
use optout_core_types::{fields, ProfileId};
use optout_state_center::{JsonProfileStore, ProfileState, ProfileStore};

use crate::cli::output::{emit, OutputFormat};
use crate::config::Config;
use crate::errors::ConfigurationError;

#[derive(Args, Clone, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ProfileCommand {
    /// List saved profiles
    List,
    /// Show a profile's identity and completed targets
    Show {
        #[arg(value_name = "PROFILE")]
        name: String,
    },
    /// Delete a saved profile
    Remove {
        #[arg(value_name = "PROFILE")]
        name: String,
    },
}

pub async fn cmd_profile(args: ProfileArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let store = JsonProfileStore::new(config.profiles_dir());

    match args.command {
        ProfileCommand::List => {
            let profiles: Vec<String> = store
                .list()?
                .into_iter()
                .map(|profile| profile.to_string())
                .collect();
            if emit(output, &profiles)? {
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No saved profiles in {}", store.dir().display());
            }
            for profile in profiles {
                println!("{profile}");
            }
        }
        ProfileCommand::Show { name } => {
            let profile = parse_profile(&name)?;
            let state = store.load(&profile);
            if !state.exists() {
                anyhow::bail!("profile '{}' has no saved state", profile);
            }
            let state = masked(state);
            if emit(output, &state)? {
                return Ok(());
            }
            print_profile(&state);
        }
        ProfileCommand::Remove { name } => {
            let profile = parse_profile(&name)?;
            if store.remove(&profile)? {
                println!("Removed profile '{}'", profile);
            } else {
                println!("No saved profile named '{}'", profile);
            }
        }
    }
    Ok(())
}

fn parse_profile(name: &str) -> Result<ProfileId, ConfigurationError> {
    Ok(ProfileId::parse(name)?)
}

fn print_profile(state: &ProfileState) {
    println!("Profile: {}", state.profile);
    if let Some(updated) = state.last_updated {
        println!("Last updated: {}", updated.to_rfc3339());
    }
    println!("Identity:");
    for (field, value) in &state.identity {
        println!("  {field}: {value}");
    }
    println!("Completed targets ({}):", state.completed_targets.len());
    for target in &state.completed_targets {
        println!("  {}", target.as_str());
    }
}

/// Copy of `state` safe to print in any output format.
fn masked(mut state: ProfileState) -> ProfileState {
    if let Some(ssn) = state.identity.get_mut(fields::SSN) {
        *ssn = mask(ssn);
    }
    state
}

/// Keeps the last four characters.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let keep = chars.len().min(4);
    let hidden = chars.len() - keep;
    "*".repeat(hidden) + &chars[hidden..].iter().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask("123-45-6789"), "*******6789");
        assert_eq!(mask("12"), "12");
    }

    #[test]
    fn shown_profile_hides_ssn_in_every_format() {
        let mut state = ProfileState::empty(ProfileId::parse("jane").unwrap());
        state.identity.insert(fields::SSN.into(), "123-45-6789".into());
        state.identity.insert("first_name".into(), "Jane".into());

        let state = masked(state);
        assert_eq!(state.identity[fields::SSN], "*******6789");
        assert_eq!(state.identity["first_name"], "Jane");

        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("123-45-6789"));
        let yaml = serde_yaml::to_string(&state).unwrap();
        assert!(!yaml.contains("123-45-6789"));
    }

    #[test]
    fn profile_names_are_validated() {
        assert!(parse_profile("jane_doe-2").is_ok());
        assert!(matches!(
            parse_profile("jane/doe"),
            Err(ConfigurationError::InvalidProfile(_))
        ));
    }
}
