// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    logging::DEFAULT_LOG_SPEC,
};
use ::std::{
    fs::File,
    io::Read,
    ops::Index,
    str::FromStr,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Event loop and logging options.
mod swirl_config {
    pub const SECTION_NAME: &str = "swirl";
    // Upper bound on the number of callbacks dispatched in a single event loop turn.
    pub const MAX_CALLBACKS_PER_TURN: &str = "max_callbacks_per_turn";
    // Upper bound on the number of turns when running the event loop until idle.
    pub const MAX_TURNS: &str = "max_turns";
    // Log specification handed to the logger.
    pub const LOG_SPEC: &str = "log_spec";
}

/// Default bound on the number of event loop turns.
pub const DEFAULT_MAX_TURNS: usize = 1024;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Swirl configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        File::open(config_path)?.read_to_string(&mut config_s)?;
        Self::parse(&config_s)
    }

    /// Parses a configuration document.
    pub fn parse(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration ({})", e);
                error!("parse(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            &[ref c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }

    fn get_swirl_config(&self) -> Result<&Yaml, Fail> {
        Self::get_subsection(&self.0, swirl_config::SECTION_NAME)
    }

    /// Reads the per-turn callback budget. Returns None if the event loop should drain every queued callback.
    pub fn max_callbacks_per_turn(&self) -> Result<Option<usize>, Fail> {
        if let Some(budget) = Self::get_typed_env_option(swirl_config::MAX_CALLBACKS_PER_TURN)? {
            return Self::validate_budget(swirl_config::MAX_CALLBACKS_PER_TURN, budget).map(Some);
        }
        match self.get_optional(swirl_config::MAX_CALLBACKS_PER_TURN)? {
            Some(_) => {
                let budget: usize = Self::get_int_option(self.get_swirl_config()?, swirl_config::MAX_CALLBACKS_PER_TURN)?;
                Self::validate_budget(swirl_config::MAX_CALLBACKS_PER_TURN, budget).map(Some)
            },
            None => Ok(None),
        }
    }

    /// Reads the bound on event loop turns.
    pub fn max_turns(&self) -> Result<usize, Fail> {
        if let Some(turns) = Self::get_typed_env_option(swirl_config::MAX_TURNS)? {
            return Self::validate_budget(swirl_config::MAX_TURNS, turns);
        }
        match self.get_optional(swirl_config::MAX_TURNS)? {
            Some(_) => {
                let turns: usize = Self::get_int_option(self.get_swirl_config()?, swirl_config::MAX_TURNS)?;
                Self::validate_budget(swirl_config::MAX_TURNS, turns)
            },
            None => Ok(DEFAULT_MAX_TURNS),
        }
    }

    /// Reads the log specification.
    pub fn log_spec(&self) -> Result<String, Fail> {
        if let Some(spec) = Self::get_typed_env_option::<String>(swirl_config::LOG_SPEC)? {
            return Ok(spec);
        }
        match self.get_optional(swirl_config::LOG_SPEC)? {
            Some(_) => Self::get_typed_str_option(self.get_swirl_config()?, swirl_config::LOG_SPEC, |val: &str| {
                Some(val.to_string())
            }),
            None => Ok(DEFAULT_LOG_SPEC.to_string()),
        }
    }

    /// Returns the raw value of an option in the swirl section, or None if either the section or the option is absent.
    fn get_optional(&self, index: &str) -> Result<Option<&Yaml>, Fail> {
        let section: &Yaml = match self.0.index(swirl_config::SECTION_NAME) {
            Yaml::BadValue => return Ok(None),
            Yaml::Hash(_) => &self.0[swirl_config::SECTION_NAME],
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", swirl_config::SECTION_NAME);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            },
        };
        match section.index(index) {
            Yaml::BadValue => Ok(None),
            value => Ok(Some(value)),
        }
    }

    fn validate_budget(index: &str, value: usize) -> Result<usize, Fail> {
        if value == 0 {
            let message: String = format!("parameter \"{}\" must be positive", index);
            error!("validate_budget(): {}", message);
            return Err(Fail::new(libc::ERANGE, message.as_str()));
        }
        Ok(value)
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists and is a subsection.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            Yaml::BadValue => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            value => Ok(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Same as `get_typed_option` but the receiver parses the option's string value.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self(Yaml::Hash(Default::default()))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
