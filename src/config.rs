/*
Copyright 2026 The prodspec Authors
Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at
http://www.apache.org/licenses/LICENSE-2.0
Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use crate::store::codec::MIN_NAME_LEN;
use std::path::Path;
use yaml_rust::{Yaml, YamlLoader};

#[derive(Clone, Debug)]
pub struct Config {
    /// ERROR / WARNING / INFO / DEBUG1 / DEBUG2
    pub log_min_messages: String,
    /// database base name to open at startup
    pub database: Option<String>,
    /// name field width used when Create is not given one
    pub default_name_len: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_min_messages: "INFO".to_string(),
            database: None,
            default_name_len: 40,
        }
    }
}

impl Config {
    pub fn verbosity(&self) -> usize {
        match self.log_min_messages.as_str() {
            "ERROR" => 0,
            "WARNING" => 1,
            "INFO" => 2,
            "DEBUG1" => 3,
            "DEBUG2" => 4,
            _ => 2,
        }
    }
}

fn yaml_try_tostr(input: &Yaml) -> Option<String> {
    match input {
        Yaml::String(v) => Some(v.clone()),
        &Yaml::Integer(v) => Some(v.to_string()),
        Yaml::Real(v) => Some(v.clone()),
        _ => None,
    }
}

fn yaml_try_toi32(input: &Yaml) -> Option<i32> {
    match input {
        &Yaml::Integer(v) => Some(v as i32),
        Yaml::String(v) => v.parse().ok(),
        &Yaml::Boolean(v) => Some(if v { 1 } else { 0 }),
        Yaml::Real(v) => v.parse().ok(),
        _ => None,
    }
}

fn load_item(cfg: &mut Config, key: &str, val: &Yaml) {
    match key {
        "log_min_messages" => match yaml_try_tostr(val) {
            Some(v) => {
                let v = v.to_uppercase();
                match v.as_str() {
                    "ERROR" | "WARNING" | "INFO" | "DEBUG1" | "DEBUG2" => {
                        cfg.log_min_messages = v
                    }
                    _ => log::warn!("invalid log_min_messages. val={:?}", v),
                }
            }
            None => log::warn!("invalid config val. key={:?} val={:?}", key, val),
        },
        "database" => match yaml_try_tostr(val) {
            Some(v) => cfg.database = Some(v),
            None => log::warn!("invalid config val. key={:?} val={:?}", key, val),
        },
        "default_name_len" => match yaml_try_toi32(val) {
            Some(v) if v >= MIN_NAME_LEN as i32 && v <= u16::MAX as i32 => {
                cfg.default_name_len = v as u16
            }
            _ => log::warn!("invalid config val. key={:?} val={:?}", key, val),
        },
        _ => log::warn!("unknown config key. key={:?}", key),
    }
}

pub fn parse(data: &str) -> anyhow::Result<Config> {
    let mut cfg = Config::default();
    let yamldata = YamlLoader::load_from_str(data)?;
    if let Some(yamldoc) = yamldata.first() {
        let yamlhash = yamldoc
            .as_hash()
            .ok_or(anyhow::anyhow!("Unknown yaml. yamldata={:?}", yamldata))?;
        for (key, val) in yamlhash {
            match yaml_try_tostr(key) {
                Some(k) => load_item(&mut cfg, &k, val),
                None => log::warn!("unknown config key. yaml_try_tostr failed. key={:?}", key),
            }
        }
    }
    return Ok(cfg);
}

/// A missing config file is not an error; every setting has a default.
pub fn load(inputpath: &str) -> anyhow::Result<Config> {
    if !Path::new(inputpath).exists() {
        return Ok(Config::default());
    }
    let data = std::fs::read_to_string(inputpath)?;
    return parse(&data);
}

#[cfg(test)]
mod config_test {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let cfg = parse("log_min_messages: DEBUG1\ndatabase: parts\ndefault_name_len: 16\n")
            .unwrap();
        assert_eq!(cfg.log_min_messages, "DEBUG1");
        assert_eq!(cfg.verbosity(), 3);
        assert_eq!(cfg.database.as_deref(), Some("parts"));
        assert_eq!(cfg.default_name_len, 16);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let cfg = parse("log_min_messages: LOUD\ndefault_name_len: 2\nnosuchkey: 1\n").unwrap();
        assert_eq!(cfg.log_min_messages, "INFO");
        assert_eq!(cfg.default_name_len, 40);
        assert!(cfg.database.is_none());
    }

    #[test]
    fn level_names_are_case_insensitive() {
        let cfg = parse("log_min_messages: warning\n").unwrap();
        assert_eq!(cfg.log_min_messages, "WARNING");
        assert_eq!(cfg.verbosity(), 1);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load("/nonexistent/prodspec.conf").unwrap();
        assert_eq!(cfg.log_min_messages, "INFO");
        assert_eq!(cfg.default_name_len, 40);
    }
}
