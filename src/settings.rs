//! User-tunable chat settings and their persistence.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	model::GenerationConfig,
	store::{KeyValueStore, SETTINGS_KEY, StoreError, THEME_KEY},
};

/// Color scheme preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
	/// Dark palette.
	#[default]
	Dark,
	/// Light palette.
	Light,
}
impl Theme {
	/// Returns the stored label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Theme::Dark => "dark",
			Theme::Light => "light",
		}
	}

	/// Returns the opposite theme.
	pub const fn toggled(self) -> Self {
		match self {
			Theme::Dark => Theme::Light,
			Theme::Light => Theme::Dark,
		}
	}
}
impl Display for Theme {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Theme {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"dark" => Ok(Theme::Dark),
			"light" => Ok(Theme::Light),
			// Unknown labels fall back to the default palette.
			_ => Ok(Theme::default()),
		}
	}
}

/// Settings that shape every generation request plus display preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatSettings {
	/// Model name sent with every request.
	pub model: String,
	/// Sampling temperature in `0.0..=2.0`.
	pub temperature: f32,
	/// Upper bound for generated tokens.
	pub max_tokens: u32,
	/// Number of earlier messages forwarded as context.
	pub context_window: usize,
	/// Color scheme.
	pub theme: Theme,
	/// Interface language tag.
	pub language: String,
}
impl ChatSettings {
	/// Model used when nothing else is configured.
	pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
	/// Context window used when nothing else is configured.
	pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

	/// Checks every field against its allowed range.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.model.trim().is_empty() {
			return Err(ConfigError::EmptyModel);
		}
		if !(0.0..=2.0).contains(&self.temperature) {
			return Err(ConfigError::TemperatureOutOfRange { value: self.temperature });
		}
		if self.max_tokens == 0 {
			return Err(ConfigError::ZeroMaxTokens);
		}
		if self.context_window == 0 {
			return Err(ConfigError::ZeroContextWindow);
		}

		Ok(())
	}

	/// Sampling parameters derived from these settings.
	pub fn generation_config(&self) -> GenerationConfig {
		GenerationConfig { temperature: self.temperature, max_output_tokens: self.max_tokens }
	}

	/// Loads settings from `store`, falling back to defaults for anything missing.
	///
	/// The standalone theme key wins over the theme embedded in the settings JSON.
	pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
		let mut settings = match store.get(SETTINGS_KEY).await? {
			Some(raw) => {
				let mut deserializer = serde_json::Deserializer::from_str(&raw);
				let settings: Self = serde_path_to_error::deserialize(&mut deserializer)
					.map_err(|e| StoreError::Serialization {
						message: format!("Saved settings are unreadable at `{}`: {}", e.path(), e.inner()),
					})?;

				settings
			},
			None => Self::default(),
		};

		if let Some(theme) = store.get(THEME_KEY).await? {
			settings.theme = theme.parse()?;
		}

		settings.validate()?;

		Ok(settings)
	}

	/// Validates and persists the settings, mirroring the theme under its own key.
	pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
		self.validate()?;

		let raw = serde_json::to_string(self).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize settings: {e}"),
		})?;

		store.set(SETTINGS_KEY, raw).await?;
		store.set(THEME_KEY, self.theme.to_string()).await?;

		Ok(())
	}
}
impl Default for ChatSettings {
	fn default() -> Self {
		let generation = GenerationConfig::default();

		Self {
			model: Self::DEFAULT_MODEL.into(),
			temperature: generation.temperature,
			max_tokens: generation.max_output_tokens,
			context_window: Self::DEFAULT_CONTEXT_WINDOW,
			theme: Theme::default(),
			language: "en".into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[test]
	fn validation_rejects_out_of_range_fields() {
		assert_eq!(ChatSettings::default().validate(), Ok(()));

		let hot = ChatSettings { temperature: 2.5, ..Default::default() };

		assert_eq!(hot.validate(), Err(ConfigError::TemperatureOutOfRange { value: 2.5 }));
		assert_eq!(
			ChatSettings { max_tokens: 0, ..Default::default() }.validate(),
			Err(ConfigError::ZeroMaxTokens)
		);
		assert_eq!(
			ChatSettings { context_window: 0, ..Default::default() }.validate(),
			Err(ConfigError::ZeroContextWindow)
		);
		assert_eq!(
			ChatSettings { model: " ".into(), ..Default::default() }.validate(),
			Err(ConfigError::EmptyModel)
		);
	}

	#[tokio::test]
	async fn save_then_load_round_trips_and_mirrors_theme() {
		let store = MemoryStore::default();
		let settings =
			ChatSettings { theme: Theme::Light, temperature: 1.0, ..Default::default() };

		settings.save(&store).await.expect("Save should succeed.");

		assert_eq!(store.get(THEME_KEY).await.expect("Get should succeed."), Some("light".into()));
		assert_eq!(ChatSettings::load(&store).await.expect("Load should succeed."), settings);
	}

	#[tokio::test]
	async fn partial_settings_fill_in_defaults() {
		let store = MemoryStore::default();

		store
			.set(SETTINGS_KEY, "{\"temperature\":0.2}".into())
			.await
			.expect("Set should succeed.");
		store.set(THEME_KEY, "light".into()).await.expect("Set should succeed.");

		let settings = ChatSettings::load(&store).await.expect("Load should succeed.");

		assert_eq!(settings.temperature, 0.2);
		assert_eq!(settings.model, ChatSettings::DEFAULT_MODEL);
		assert_eq!(settings.theme, Theme::Light);
		assert_eq!(settings.generation_config().max_output_tokens, 1024);
	}

	#[test]
	fn theme_toggles_and_parses_leniently() {
		assert_eq!(Theme::Dark.toggled(), Theme::Light);
		assert_eq!("light".parse::<Theme>(), Ok(Theme::Light));
		assert_eq!("sepia".parse::<Theme>(), Ok(Theme::Dark));
	}
}
