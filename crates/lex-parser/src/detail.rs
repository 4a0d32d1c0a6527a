//! Document detail-page parsing: metadata block, articles, reform table.
//!
//! The detail page (`wfOrdenamientoDetalle.aspx`) hangs everything off
//! `#contenedor`: a title heading, a labeled key-value metadata block
//! (`.datos-ordenamiento`), the instrument body (`#contenido-ordenamiento`)
//! with per-article blocks, and a reform history table (`#reformas`).
//! Labels are Spanish and appear with and without accents; both spellings
//! are recognized.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ParserError;
use crate::search::{element_text, extract_q_param, has_link};

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| sel("#contenedor"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| sel(".titulo-ordenamiento"));
static DATOS: LazyLock<Selector> = LazyLock::new(|| sel(".datos-ordenamiento"));
static DATO: LazyLock<Selector> = LazyLock::new(|| sel(".dato"));
static ETIQUETA: LazyLock<Selector> = LazyLock::new(|| sel(".etiqueta"));
static VALOR: LazyLock<Selector> = LazyLock::new(|| sel(".valor"));
static CONTENIDO: LazyLock<Selector> = LazyLock::new(|| sel("#contenido-ordenamiento"));
static ARTICULO: LazyLock<Selector> = LazyLock::new(|| sel(".articulo"));
static ART_ID_PREFIX: LazyLock<Selector> = LazyLock::new(|| sel(r#"div[id^="art"]"#));
static HEADING: LazyLock<Selector> = LazyLock::new(|| sel("h2, h3, h4"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| sel("p"));
static REFORMAS: LazyLock<Selector> = LazyLock::new(|| sel("#reformas"));
static REFORMA_ROW: LazyLock<Selector> = LazyLock::new(|| sel("tr.reforma-row"));
static TABLA_REFORMAS_ROW: LazyLock<Selector> = LazyLock::new(|| sel(".tabla-reformas tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| sel("td"));
static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"a[href*="wfOrdenamientoDetalle"]"#));

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:TRANSITORIO\s+)?(PRIMERO|SEGUNDO|TERCERO|CUARTO|QUINTO|SEXTO|S[ÉE]PTIMO|OCTAVO|NOVENO|D[ÉE]CIMO|\d+)",
    )
    .expect("static regex")
});
static ARTICLE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Aa]rt[ií]culo\s+(\d+-[A-Z]|\d+(?:\s*[°º])?(?:\s+[Bb]is)?(?:\s+[A-Z]\b)?)")
        .expect("static regex")
});
static ANY_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));
static LETTERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-ZÁÉÍÓÚÑÜ]").expect("static regex"));

/// Spanish articles and prepositions dropped when deriving a short title.
const SHORT_TITLE_STOPWORDS: [&str; 12] = [
    "DE", "DEL", "LA", "LAS", "LOS", "EL", "EN", "Y", "A", "PARA", "POR", "CON",
];

/// Everything extracted from a detail page except articles and reforms,
/// which parse separately. Category/scope/status stay raw strings here; the
/// scraper maps them to variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentDetail {
    pub title: String,
    pub short_title: String,
    pub category: String,
    pub scope: String,
    pub status: String,
    pub publication_date: Option<String>,
    pub expedition_date: Option<String>,
    pub full_text: String,
    pub article_count: usize,
}

/// A parsed article block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleBlock {
    pub number: String,
    pub title: String,
    pub content: String,
    pub is_transitory: bool,
}

/// A parsed reform-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReformRow {
    pub q_param: String,
    pub title: String,
    pub publication_date: Option<String>,
    pub gazette_reference: String,
    pub has_pdf: bool,
}

/// Parse a document detail page.
///
/// An empty title is permitted and yields an empty result.
///
/// # Errors
///
/// [`ParserError::Shape`] when `#contenedor` is absent.
pub fn parse_document_detail(html: &str) -> Result<DocumentDetail, ParserError> {
    let document = Html::parse_document(html);

    let Some(container) = document.select(&CONTAINER).next() else {
        return Err(ParserError::shape(
            "document container #contenedor not found",
            html,
        ));
    };

    let title = container
        .select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let mut detail = DocumentDetail {
        short_title: short_title(&title),
        title,
        ..DocumentDetail::default()
    };

    if let Some(datos) = container.select(&DATOS).next() {
        apply_metadata(datos, &mut detail);
    }

    if let Some(contenido) = container.select(&CONTENIDO).next() {
        detail.full_text = contenido
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        detail.article_count = parse_article_elements(contenido).len();
    }

    Ok(detail)
}

fn apply_metadata(datos: ElementRef<'_>, detail: &mut DocumentDetail) {
    for dato in datos.select(&DATO) {
        let (Some(etiqueta), Some(valor)) =
            (dato.select(&ETIQUETA).next(), dato.select(&VALOR).next())
        else {
            continue;
        };

        let label = normalize_metadata_label(&element_text(etiqueta));
        let value = element_text(valor);
        let optional = (!value.is_empty()).then(|| value.clone());

        match label.as_str() {
            "tipo de ordenamiento" => detail.category = value,
            "ambito" => detail.scope = value,
            "estatus" => detail.status = value,
            "fecha de publicacion" => detail.publication_date = optional,
            "fecha de expedicion" => detail.expedition_date = optional,
            _ => {}
        }
    }
}

fn normalize_metadata_label(label: &str) -> String {
    label
        .trim()
        .trim_end_matches(':')
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            _ => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Parse article blocks out of instrument-body HTML.
///
/// Blocks are identified by the `.articulo` class, falling back to `div`s
/// whose id starts with `art`. Returns an empty vec when nothing matches.
#[must_use]
pub fn parse_articles(html: &str) -> Vec<ArticleBlock> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    parse_article_elements(root)
}

fn parse_article_elements(scope: ElementRef<'_>) -> Vec<ArticleBlock> {
    let mut elements: Vec<ElementRef<'_>> = scope.select(&ARTICULO).collect();
    if elements.is_empty() {
        elements = scope.select(&ART_ID_PREFIX).collect();
    }

    elements
        .into_iter()
        .filter_map(parse_article_element)
        .collect()
}

fn parse_article_element(elem: ElementRef<'_>) -> Option<ArticleBlock> {
    let classes: Vec<&str> = elem.value().classes().collect();
    let mut is_transitory = classes
        .iter()
        .any(|c| c.to_lowercase().contains("transitorio"));

    let text_content = elem.text().collect::<String>();
    if text_content.to_uppercase().contains("TRANSITORIO") {
        is_transitory = true;
    }

    let title = elem
        .select(&HEADING)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let number = extract_article_number(&title, is_transitory);

    let mut parts: Vec<String> = elem
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    if parts.is_empty() {
        let mut content = text_content.trim().to_string();
        if !title.is_empty() && content.starts_with(&title) {
            content = content[title.len()..].trim().to_string();
        }
        if !content.is_empty() {
            parts.push(content);
        }
    }

    let content = parts.join("\n");
    if number.is_empty() && content.is_empty() {
        return None;
    }

    Some(ArticleBlock {
        number,
        title,
        content,
        is_transitory,
    })
}

/// Pull an article number out of a heading.
///
/// Handles `"Artículo 1"`, `"1°"`/`"1º"`, `"2 Bis"`, `"123-A"`, and Spanish
/// ordinals for transitory articles (`"TRANSITORIO PRIMERO"` → `"PRIMERO"`).
/// Returns an empty string when nothing number-like is present.
#[must_use]
pub fn extract_article_number(title: &str, is_transitory: bool) -> String {
    if title.is_empty() {
        return String::new();
    }

    if is_transitory {
        let upper = title.to_uppercase();
        if let Some(caps) = ORDINAL_RE.captures(&upper) {
            return caps[1].to_string();
        }
    }

    if let Some(caps) = ARTICLE_NUMBER_RE.captures(title) {
        return caps[1].trim().to_string();
    }

    ANY_NUMBER_RE
        .find(title)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parse the reform history table.
///
/// Rows identified by `tr.reforma-row`, falling back to any row of
/// `.tabla-reformas`. Rows without a detail link or `q` param are skipped.
#[must_use]
pub fn parse_reforms(html: &str) -> Vec<ReformRow> {
    let document = Html::parse_document(html);

    let Some(section) = document.select(&REFORMAS).next() else {
        return Vec::new();
    };

    let mut rows: Vec<ElementRef<'_>> = section.select(&REFORMA_ROW).collect();
    if rows.is_empty() {
        rows = section.select(&TABLA_REFORMAS_ROW).collect();
    }

    rows.into_iter().filter_map(parse_reform_row).collect()
}

fn parse_reform_row(row: ElementRef<'_>) -> Option<ReformRow> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.is_empty() {
        return None;
    }

    let link = row.select(&DETAIL_LINK).next()?;
    let title = element_text(link);
    let q_param = extract_q_param(link.value().attr("href")?)?;

    let publication_date = cells.get(1).map(|c| element_text(*c)).filter(|t| !t.is_empty());
    let gazette_reference = cells.get(2).map(|c| element_text(*c)).unwrap_or_default();

    Some(ReformRow {
        q_param,
        title,
        publication_date,
        gazette_reference,
        has_pdf: has_link(row, "AbrirDocReforma"),
    })
}

/// Derive a short title from Spanish initials, dropping stopwords:
/// `"LEY FEDERAL DEL TRABAJO"` → `"LFT"`.
#[must_use]
pub fn short_title(title: &str) -> String {
    title
        .to_uppercase()
        .split_whitespace()
        .filter_map(|word| {
            let clean = LETTERS_RE.replace_all(word, "");
            if clean.is_empty() || SHORT_TITLE_STOPWORDS.contains(&clean.as_ref()) {
                return None;
            }
            clean.chars().next()
        })
        .collect()
}
