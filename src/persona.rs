//! Expert personas
//!
//! A persona is an immutable chat personality bound to one provider, a model
//! tier, and a system prompt. The registry is loaded once at startup, either
//! from the builtin set or from a TOML file, and the core only reads it.

use crate::providers::ProviderKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Model tier within a provider's lineup. Each adapter maps the tier to a
/// concrete model id and its rate-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheapest model (Haiku, Flash-8B, ...). Factual Q&A.
    Light,
    #[default]
    Standard,
    /// Most capable model. Deep reasoning personas.
    Heavy,
}

/// Expected answer complexity; bounds max output tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl Complexity {
    /// Output-token budget per complexity class.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            Complexity::Simple => 800,
            Complexity::Medium => 1200,
            Complexity::Complex => 1600,
        }
    }
}

/// A configured expert personality.
#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub title: String,
    pub system_instruction: String,
    #[serde(default)]
    pub welcome_message: String,
    /// Suggested follow-up prompts. Informational only; never sent upstream.
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub provider: ProviderKind,
    #[serde(default)]
    pub tier: ModelTier,
    #[serde(default)]
    pub complexity: Complexity,
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(rename = "persona")]
    personas: Vec<Persona>,
}

/// Ordered, read-only persona source.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    /// Load registry from a TOML file with `[[persona]]` tables.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading persona file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: PersonaFile = toml::from_str(raw).context("parsing persona file")?;
        Ok(Self::new(file.personas))
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Builtin expert panel, used when no persona file is configured.
    pub fn builtin() -> Self {
        Self::new(vec![
            Persona {
                id: "money-housing".to_string(),
                name: "Dr. Fahad Al-Sakani".to_string(),
                title: "Real Estate & Housing Expert".to_string(),
                system_instruction: "You are Dr. Fahad Al-Sakani, a real estate and housing \
                    expert. Focus: buying vs renting, mortgage strategies, real estate \
                    investment. Tone: direct, analytical, reassuring. Use numbers and \
                    clear calculations."
                    .to_string(),
                welcome_message: "Let's break the housing question down with numbers."
                    .to_string(),
                suggestions: vec![
                    "Should I buy or keep renting?".to_string(),
                    "How much house can I afford?".to_string(),
                ],
                provider: ProviderKind::Gemini,
                tier: ModelTier::Standard,
                complexity: Complexity::Medium,
            },
            Persona {
                id: "money-invest".to_string(),
                name: "Dr. Mohammed Al-Istithmari".to_string(),
                title: "Senior Investment Advisor".to_string(),
                system_instruction: "You are Dr. Mohammed Al-Istithmari, a senior investment \
                    advisor. Focus: stock markets, bonds, sukuk, portfolio diversification, \
                    risk management. Tone: professional, calm, long-term oriented. Warn \
                    against get-rich-quick schemes."
                    .to_string(),
                welcome_message: "Investing is a marathon, not a sprint. Where shall we start?"
                    .to_string(),
                suggestions: vec!["How do I diversify a small portfolio?".to_string()],
                provider: ProviderKind::Anthropic,
                tier: ModelTier::Heavy,
                complexity: Complexity::Complex,
            },
            Persona {
                id: "self-calm".to_string(),
                name: "Dr. Sarah Al-Hadea".to_string(),
                title: "Anxiety & Stress Specialist".to_string(),
                system_instruction: "You are Dr. Sarah Al-Hadea, a psychologist specializing \
                    in anxiety and stress management. Focus: mindfulness, coping mechanisms, \
                    work-life balance. Tone: soothing, gentle, a deep listener."
                    .to_string(),
                welcome_message: "Take a deep breath. I'm here to listen.".to_string(),
                suggestions: vec!["I feel overwhelmed at work".to_string()],
                provider: ProviderKind::Anthropic,
                tier: ModelTier::Light,
                complexity: Complexity::Simple,
            },
            Persona {
                id: "career-side".to_string(),
                name: "Ms. Nora Al-Hurra".to_string(),
                title: "Side Income Strategist".to_string(),
                system_instruction: "You are Ms. Nora Al-Hurra, an expert in freelancing, \
                    side hustles, and passive income. Focus: gig economy, monetizing \
                    skills, low-capital startups. Tone: energetic, practical, focused on \
                    actionable first steps."
                    .to_string(),
                welcome_message: "A salary alone is not enough. Let's build your side income."
                    .to_string(),
                suggestions: vec!["How do I land my first freelance client?".to_string()],
                provider: ProviderKind::DeepSeek,
                tier: ModelTier::Standard,
                complexity: Complexity::Medium,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = PersonaRegistry::builtin();
        assert!(!registry.is_empty());
        let persona = registry.get("money-invest").unwrap();
        assert_eq!(persona.provider, ProviderKind::Anthropic);
        assert_eq!(persona.complexity.max_output_tokens(), 1600);
    }

    #[test]
    fn test_load_from_toml() {
        let raw = r#"
            [[persona]]
            id = "legal-1"
            name = "Counsel"
            title = "Contracts Expert"
            system_instruction = "You are a contracts lawyer."
            provider = "deepseek"
            tier = "light"
            complexity = "simple"

            [[persona]]
            id = "tech-1"
            name = "Architect"
            title = "Systems Expert"
            system_instruction = "You are a systems architect."
            provider = "gemini"
        "#;

        let registry = PersonaRegistry::from_toml_str(raw).unwrap();
        assert_eq!(registry.len(), 2);

        let legal = registry.get("legal-1").unwrap();
        assert_eq!(legal.tier, ModelTier::Light);
        assert_eq!(legal.complexity.max_output_tokens(), 800);

        // Defaults apply where the file is silent
        let tech = registry.get("tech-1").unwrap();
        assert_eq!(tech.tier, ModelTier::Standard);
        assert!(tech.suggestions.is_empty());
    }

    #[test]
    fn test_unknown_persona() {
        let registry = PersonaRegistry::builtin();
        assert!(registry.get("nope").is_none());
    }
}
