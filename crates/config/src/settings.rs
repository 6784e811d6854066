use crate::error::{ErrorKind, Result};
use crate::file::write_atomically;
use exn::ResultExt;
use figment::Figment;
use figment::providers::Serialized;
use sastra_models::BookEntry;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// The only mode the reader starts in.
pub const BOOKS_MODE: &str = "books";

/// Which parts of a verse are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayFlags {
    pub show_translation: bool,
    pub show_synonyms: bool,
    pub show_devanagari: bool,
    pub show_roman: bool,
    pub show_purport: bool,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self { show_translation: true, show_synonyms: true, show_devanagari: true, show_roman: true, show_purport: true }
    }
}

/// Reader state shared by the whole application.
///
/// Owned by the application shell and passed to library operations that
/// update it. `toc` and `available_voices` are rebuilt at runtime and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// One table of contents per entry of `books_available`.
    #[serde(skip)]
    pub toc: Vec<Value>,
    pub font_size: u32,
    pub mode: String,
    pub theme: String,
    pub vc: DisplayFlags,
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// Code of the open book.
    pub code: Option<String>,
    pub books_available: Vec<BookEntry>,
    /// The open book.
    pub book: Option<BookEntry>,
    #[serde(skip)]
    pub available_voices: Vec<String>,
    #[serde(rename = "selectedVoiceURI")]
    pub selected_voice_uri: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            toc: Vec::new(),
            font_size: 18,
            mode: BOOKS_MODE.to_string(),
            theme: "light".to_string(),
            vc: DisplayFlags::default(),
            id: None,
            code: None,
            books_available: Vec::new(),
            book: None,
            available_voices: Vec::new(),
            selected_voice_uri: None,
        }
    }
}

/// Older builds stored a numeric `id`.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    }))
}

fn extract(stored: &Map<String, Value>) -> std::result::Result<Settings, figment::Error> {
    Figment::from(Serialized::defaults(Settings::default())).merge(Serialized::defaults(stored)).extract()
}

/// Where [`Settings`] are persisted: one JSON file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Defaults merged with whatever the file holds.
    ///
    /// A missing file gives the defaults. Keys the file doesn't know about
    /// take their default; keys this build doesn't know about are dropped,
    /// and so are stored values that no longer fit their field. Only a file
    /// that can't be read or isn't a JSON object fails. `mode` always starts
    /// as [`BOOKS_MODE`].
    pub fn load(&self) -> Result<Settings> {
        let stored: Map<String, Value> = match std::fs::read(&self.path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            read => serde_json::from_slice(&read.or_raise(|| ErrorKind::Load)?).or_raise(|| ErrorKind::Load)?,
        };
        let mut settings = match extract(&stored) {
            Ok(settings) => settings,
            Err(err) => {
                let (kept, dropped): (Map<String, Value>, Map<String, Value>) = stored
                    .into_iter()
                    .partition(|(key, value)| extract(&Map::from_iter([(key.clone(), value.clone())])).is_ok());
                let dropped: Vec<&String> = dropped.keys().collect();
                tracing::warn!(path = %self.path.display(), ?dropped, error = %err, "Ignoring stored settings that no longer fit");
                extract(&kept).or_raise(|| ErrorKind::Load)?
            },
        };
        settings.mode = BOOKS_MODE.to_string();
        tracing::debug!(path = %self.path.display(), books = settings.books_available.len(), "Loaded settings");
        Ok(settings)
    }

    /// Write everything except `toc` and `available_voices`, replacing the
    /// file atomically.
    ///
    /// Blocking; async callers run it on the blocking pool.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let data = serde_json::to_vec_pretty(settings).or_raise(|| ErrorKind::Save(self.path.clone()))?;
        write_atomically(&self.path, &data, false)?;
        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}
