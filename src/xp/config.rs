use std::path::Path;

use color_eyre::{
    eyre::{bail, WrapErr},
    Result,
};
use serde::Deserialize;

use super::level::{LevelTable, DEFAULT_THRESHOLDS};

/// XP rewards per action. Penalties are stored as positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Rewards {
    pub pergunta: i64,
    pub resposta: i64,
    /// Total a response author ends up with once the response is accepted.
    pub resposta_certa: i64,
    pub desafio_completo: i64,
    pub desistencia: i64,
    pub formulario: i64,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            pergunta: 5,
            resposta: 1,
            resposta_certa: 30,
            desafio_completo: 50,
            desistencia: 10,
            formulario: 10,
        }
    }
}

/// Progression settings, optionally loaded from a JSON file at startup.
///
/// ```json
/// { "level_thresholds": [0, 10, 20], "rewards": { "pergunta": 5 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XpConfig {
    pub level_thresholds: Vec<i64>,
    pub rewards: Rewards,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            level_thresholds: DEFAULT_THRESHOLDS.to_vec(),
            rewards: Rewards::default(),
        }
    }
}

impl XpConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).wrap_err("invalid xp configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path`, or fall back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::info!("using built-in xp configuration");
            return Ok(Self::default());
        };

        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read xp configuration {}", path.display()))?;
        let config = Self::from_json(&json)?;
        tracing::info!(
            "xp configuration loaded from {}: {} levels",
            path.display(),
            config.level_thresholds.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        LevelTable::new(self.level_thresholds.clone())?;

        let r = &self.rewards;
        let amounts = [
            ("pergunta", r.pergunta),
            ("resposta", r.resposta),
            ("resposta_certa", r.resposta_certa),
            ("desafio_completo", r.desafio_completo),
            ("desistencia", r.desistencia),
            ("formulario", r.formulario),
        ];
        if let Some((name, amount)) = amounts.iter().find(|(_, amount)| *amount <= 0) {
            bail!("reward {name} must be positive, got {amount}");
        }
        if r.resposta_certa < r.resposta {
            bail!(
                "resposta_certa ({}) must not be lower than resposta ({})",
                r.resposta_certa,
                r.resposta
            );
        }
        Ok(())
    }

    pub fn levels(&self) -> Result<LevelTable> {
        LevelTable::new(self.level_thresholds.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = XpConfig::default();
        config.validate().unwrap();
        assert_eq!(config.levels().unwrap(), LevelTable::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = XpConfig::from_json(r#"{ "rewards": { "pergunta": 7 } }"#).unwrap();
        assert_eq!(config.rewards.pergunta, 7);
        assert_eq!(config.rewards.resposta_certa, 30);
        assert_eq!(config.level_thresholds, DEFAULT_THRESHOLDS.to_vec());
    }

    #[test]
    fn rejects_non_monotonic_thresholds() {
        let err = XpConfig::from_json(r#"{ "level_thresholds": [0, 50, 40] }"#).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn rejects_non_positive_rewards() {
        let err = XpConfig::from_json(r#"{ "rewards": { "desistencia": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("desistencia"));
    }

    #[test]
    fn rejects_accepted_reward_below_base() {
        let err =
            XpConfig::from_json(r#"{ "rewards": { "resposta": 40, "resposta_certa": 30 } }"#)
                .unwrap_err();
        assert!(err.to_string().contains("resposta_certa"));
    }
}
