//! Closed-set enums for the legislation domain.
//!
//! All enums use uppercase serialization via `#[serde(rename_all =
//! "SCREAMING_SNAKE_CASE")]` — the canonical on-disk and wire form. Upstream
//! HTML carries free-form Spanish labels (spacing, accents, case all vary),
//! so each enum also provides `from_label()`: a case- and accent-normalized
//! lookup that always resolves, falling back to a documented default instead
//! of failing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strip accents and uppercase a Spanish label for lookup.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'A',
            'é' | 'É' => 'E',
            'í' | 'Í' => 'I',
            'ó' | 'Ó' => 'O',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'U',
            _ => c.to_ascii_uppercase(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// DocumentCategory
// ---------------------------------------------------------------------------

/// Category of legal instrument in the Mexican legal system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentCategory {
    Constitucion,
    /// Default for unrecognized labels.
    #[default]
    Ley,
    LeyFederal,
    LeyGeneral,
    LeyOrganica,
    Codigo,
    Decreto,
    Reglamento,
    Acuerdo,
    Tratado,
    Convenio,
}

impl DocumentCategory {
    /// Canonical string used in persisted JSON and SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constitucion => "CONSTITUCION",
            Self::Ley => "LEY",
            Self::LeyFederal => "LEY_FEDERAL",
            Self::LeyGeneral => "LEY_GENERAL",
            Self::LeyOrganica => "LEY_ORGANICA",
            Self::Codigo => "CODIGO",
            Self::Decreto => "DECRETO",
            Self::Reglamento => "REGLAMENTO",
            Self::Acuerdo => "ACUERDO",
            Self::Tratado => "TRATADO",
            Self::Convenio => "CONVENIO",
        }
    }

    /// Resolve an upstream label. Unknown input maps to [`Self::Ley`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "CONSTITUCION" => Self::Constitucion,
            "LEY FEDERAL" | "LEY_FEDERAL" => Self::LeyFederal,
            "LEY GENERAL" | "LEY_GENERAL" => Self::LeyGeneral,
            "LEY ORGANICA" | "LEY_ORGANICA" => Self::LeyOrganica,
            "CODIGO" => Self::Codigo,
            "DECRETO" => Self::Decreto,
            "REGLAMENTO" => Self::Reglamento,
            "ACUERDO" => Self::Acuerdo,
            "TRATADO" => Self::Tratado,
            "CONVENIO" => Self::Convenio,
            _ => Self::Ley,
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocumentScope
// ---------------------------------------------------------------------------

/// Jurisdictional scope of a legal instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentScope {
    /// Default for unrecognized labels.
    #[default]
    Federal,
    Estatal,
    Cdmx,
    Internacional,
    Extranjera,
}

impl DocumentScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Federal => "FEDERAL",
            Self::Estatal => "ESTATAL",
            Self::Cdmx => "CDMX",
            Self::Internacional => "INTERNACIONAL",
            Self::Extranjera => "EXTRANJERA",
        }
    }

    /// Resolve an upstream label. Unknown input maps to [`Self::Federal`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "ESTATAL" => Self::Estatal,
            "CDMX" => Self::Cdmx,
            "INTERNACIONAL" => Self::Internacional,
            "EXTRANJERA" => Self::Extranjera,
            _ => Self::Federal,
        }
    }
}

impl fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocumentStatus
// ---------------------------------------------------------------------------

/// Validity status of a legal instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// In force. Default for unrecognized labels.
    #[default]
    Vigente,
    Abrogada,
    Derogada,
    Sustituida,
    Extinta,
}

impl DocumentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vigente => "VIGENTE",
            Self::Abrogada => "ABROGADA",
            Self::Derogada => "DEROGADA",
            Self::Sustituida => "SUSTITUIDA",
            Self::Extinta => "EXTINTA",
        }
    }

    /// Resolve an upstream label. Unknown input maps to [`Self::Vigente`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "ABROGADA" => Self::Abrogada,
            "DEROGADA" => Self::Derogada,
            "SUSTITUIDA" => Self::Sustituida,
            "EXTINTA" => Self::Extinta,
            _ => Self::Vigente,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SubjectMatter
// ---------------------------------------------------------------------------

/// Area of law a document pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectMatter {
    Administrativo,
    Civil,
    Constitucional,
    Electoral,
    Familiar,
    Fiscal,
    Laboral,
    Mercantil,
    Penal,
    Procesal,
}

impl SubjectMatter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrativo => "ADMINISTRATIVO",
            Self::Civil => "CIVIL",
            Self::Constitucional => "CONSTITUCIONAL",
            Self::Electoral => "ELECTORAL",
            Self::Familiar => "FAMILIAR",
            Self::Fiscal => "FISCAL",
            Self::Laboral => "LABORAL",
            Self::Mercantil => "MERCANTIL",
            Self::Penal => "PENAL",
            Self::Procesal => "PROCESAL",
        }
    }

    /// Resolve an upstream label, or `None` — subject matters have no
    /// meaningful default and unknown tags are dropped.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "ADMINISTRATIVO" => Some(Self::Administrativo),
            "CIVIL" => Some(Self::Civil),
            "CONSTITUCIONAL" => Some(Self::Constitucional),
            "ELECTORAL" => Some(Self::Electoral),
            "FAMILIAR" => Some(Self::Familiar),
            "FISCAL" => Some(Self::Fiscal),
            "LABORAL" => Some(Self::Laboral),
            "MERCANTIL" => Some(Self::Mercantil),
            "PENAL" => Some(Self::Penal),
            "PROCESAL" => Some(Self::Procesal),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectMatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EmbeddingStatus
// ---------------------------------------------------------------------------

/// Embedding progress for a persisted document (remote store column).
///
/// ```text
/// pending → processing → completed
///                      → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EmbeddingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BoundaryType
// ---------------------------------------------------------------------------

/// Kind of boundary the chunker split on.
///
/// Priority when `respect_boundaries` is on: article > paragraph > sentence.
/// `Forced` appears only when no boundary yields a chunk of at least
/// `min_chunk_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    Article,
    Paragraph,
    Sentence,
    Forced,
}

impl BoundaryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
            Self::Forced => "forced",
        }
    }

    /// Split priority, higher wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Article => 3,
            Self::Paragraph => 2,
            Self::Sentence => 1,
            Self::Forced => 0,
        }
    }
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
