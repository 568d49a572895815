use std::ops::Range;

use async_std::fs;
use yaml_rust::{ Yaml, YamlLoader };

use crate::error::{ GarageError, Result };
use crate::race::coordinator::RaceSettings;
use crate::race::kinematics::{ DEFAULT_DISTANCE, DEFAULT_VELOCITY };

#[derive(Debug, Clone, PartialEq)]
pub struct GarageConfig {
    pub page_size: usize,
    pub winners_page_size: usize,
    pub seed: Option<u64>,
}

impl Default for GarageConfig {
    fn default() -> Self {
        GarageConfig { page_size: 7, winners_page_size: 10, seed: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub velocity: Range<u32>,
    pub distance: Range<u32>,
    pub breakdown_probability: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            velocity: DEFAULT_VELOCITY,
            distance: DEFAULT_DISTANCE,
            breakdown_probability: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub garage: GarageConfig,
    pub engine: EngineConfig,
    pub race: RaceSettings,
}

impl Config {
    pub async fn load(path: &str) -> Result<Config> {
        info!["Loading config file {}", path];
        let content = fs::read_to_string(path).await
            .map_err(|err| GarageError::InvalidConfig(format!["Could not read {}: {}", path, err]))?;
        Config::try_from(&content)
    }
}

fn invalid(message: String) -> GarageError {
    GarageError::InvalidConfig(message)
}

fn read_usize(node: &Yaml, key: &str, default: usize) -> Result<usize> {
    match &node[key] {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::Integer(value) if *value > 0 => Ok(*value as usize),
        other => Err(invalid(format!["{} must be a positive integer, got {:?}", key, other])),
    }
}

fn read_f64(node: &Yaml, key: &str, default: f64) -> Result<f64> {
    match &node[key] {
        Yaml::BadValue | Yaml::Null => Ok(default),
        Yaml::Integer(value) => Ok(*value as f64),
        Yaml::Real(_) => node[key].as_f64()
            .ok_or_else(|| invalid(format!["{} is not a number", key])),
        other => Err(invalid(format!["{} must be a number, got {:?}", key, other])),
    }
}

fn read_range(node: &Yaml, key: &str, default: Range<u32>) -> Result<Range<u32>> {
    let bounds = match &node[key] {
        Yaml::BadValue | Yaml::Null => return Ok(default),
        Yaml::Array(bounds) => bounds,
        other => return Err(invalid(format!["{} must be [min, max], got {:?}", key, other])),
    };

    let as_bound = |yaml: &Yaml| yaml.as_i64()
        .and_then(|value| u32::try_from(value).ok());
    match bounds.as_slice() {
        [min, max] => match (as_bound(min), as_bound(max)) {
            (Some(min), Some(max)) if min > 0 && min < max => Ok(min..max),
            _ => Err(invalid(format!["{} needs 0 < min < max", key])),
        },
        _ => Err(invalid(format!["{} must have exactly two bounds", key])),
    }
}

impl TryFrom<&String> for Config {
    type Error = GarageError;

    fn try_from(str: &String) -> Result<Self> {
        let documents = YamlLoader::load_from_str(str)
            .map_err(|err| invalid(format!["Failed to parse yaml: {:?}", err]))?;
        let parsed = match documents.first() {
            Some(document) => document,
            None => return Ok(Config::default()),
        };

        let garage = &parsed["garage"];
        let seed = match &garage["seed"] {
            Yaml::BadValue | Yaml::Null => None,
            Yaml::Integer(seed) if *seed >= 0 => Some(*seed as u64),
            other => return Err(invalid(format!["seed must be a non-negative integer, got {:?}", other])),
        };
        let defaults = Config::default();

        let engine = &parsed["engine"];
        let breakdown_probability = read_f64(engine, "breakdown_probability", defaults.engine.breakdown_probability)?;
        if !(0.0..=1.0).contains(&breakdown_probability) {
            return Err(invalid(format!["breakdown_probability {} is outside [0, 1]", breakdown_probability]));
        }

        let race = RaceSettings::new(read_f64(&parsed["race"], "time_scale", defaults.race.time_scale)?)?;

        Ok(Config {
            garage: GarageConfig {
                page_size: read_usize(garage, "page_size", defaults.garage.page_size)?,
                winners_page_size: read_usize(garage, "winners_page_size", defaults.garage.winners_page_size)?,
                seed,
            },
            engine: EngineConfig {
                velocity: read_range(engine, "velocity", defaults.engine.velocity.clone())?,
                distance: read_range(engine, "distance", defaults.engine.distance.clone())?,
                breakdown_probability,
            },
            race,
        })
    }
}
