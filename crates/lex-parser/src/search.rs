//! Search-results parsing for the legislation portal.
//!
//! The results page is a DevExpress grid (`#gridResultados`). Rows link to
//! the detail page via `wfOrdenamientoDetalle.aspx?q=…`; the opaque `q`
//! parameter is the document's dedup key throughout the pipeline. Rows
//! missing a usable link are skipped, never errors. A missing grid is shape
//! drift and fails closed.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ParserError;

const PORTAL_BASE: &str = "https://legislacion.scjn.gob.mx/Buscador/Paginas/";

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector")
}

static GRID: LazyLock<Selector> = LazyLock::new(|| sel("#gridResultados"));
static EMPTY_ROW: LazyLock<Selector> = LazyLock::new(|| sel(".dxgvEmptyDataRow"));
static DATA_ROW: LazyLock<Selector> = LazyLock::new(|| sel("tr.dxgvDataRow"));
static CELL: LazyLock<Selector> = LazyLock::new(|| sel("td"));
static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| sel(r#"a[href*="wfOrdenamientoDetalle"]"#));
static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static PAGER_TOTAL: LazyLock<Selector> = LazyLock::new(|| sel(".dxpPagerTotal"));
static PAGER_ITEM: LazyLock<Selector> = LazyLock::new(|| sel(".dxpPagerItem"));

static PAGINA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)p[aá]gina\s+(\d+)\s+de\s+(\d+)").expect("static regex"));

/// A single document row from the results grid. Dates are raw strings; the
/// scraper maps them into the domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultItem {
    pub q_param: String,
    pub title: String,
    pub category: String,
    pub publication_date: Option<String>,
    pub expedition_date: Option<String>,
    pub status: String,
    pub scope: String,
    pub has_pdf: bool,
    pub has_extract: bool,
}

/// Pagination state of a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    /// Raw `onclick` callback of the next pager item, when one exists.
    pub next_page_hint: Option<String>,
}

impl PageInfo {
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Parse a search results page.
///
/// Returns an empty vec for a valid page with no results (empty grid or the
/// "no se encontraron" marker).
///
/// # Errors
///
/// [`ParserError::Shape`] when the results grid is absent.
pub fn parse_search_results(html: &str) -> Result<Vec<SearchResultItem>, ParserError> {
    let document = Html::parse_document(html);

    let Some(grid) = document.select(&GRID).next() else {
        return Err(ParserError::shape(
            "results grid #gridResultados not found",
            html,
        ));
    };

    if let Some(empty) = grid.select(&EMPTY_ROW).next() {
        let text = element_text(empty).to_lowercase();
        if text.contains("no se encontraron") {
            return Ok(Vec::new());
        }
    }

    let mut results = Vec::new();
    for row in grid.select(&DATA_ROW) {
        if let Some(item) = parse_result_row(row) {
            results.push(item);
        }
    }
    Ok(results)
}

fn parse_result_row(row: ElementRef<'_>) -> Option<SearchResultItem> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < 6 {
        return None;
    }

    let link = cells[0].select(&DETAIL_LINK).next()?;
    let title = element_text(link);
    let q_param = extract_q_param(link.value().attr("href")?)?;
    if title.is_empty() || q_param.is_empty() {
        return None;
    }

    let cell_text = |idx: usize| -> String { element_text(cells[idx]) };
    let optional = |idx: usize| -> Option<String> {
        let text = cell_text(idx);
        (!text.is_empty()).then_some(text)
    };

    Some(SearchResultItem {
        q_param,
        title,
        publication_date: optional(1),
        expedition_date: optional(2),
        status: cell_text(3),
        category: cell_text(4),
        scope: cell_text(5),
        has_extract: has_link(row, "wfExtracto"),
        has_pdf: has_link(row, "AbrirDocReforma"),
    })
}

/// Extract pagination from a results page. Absent or unparseable pager
/// degrades to page 1 of 1 — pagination failures never abort a run.
#[must_use]
pub fn extract_pagination(html: &str) -> PageInfo {
    let document = Html::parse_document(html);

    let mut info = PageInfo {
        current_page: 1,
        total_pages: 1,
        next_page_hint: None,
    };

    let Some(grid) = document.select(&GRID).next() else {
        return info;
    };

    if let Some(pager) = grid.select(&PAGER_TOTAL).next() {
        let text = element_text(pager);
        if let Some(caps) = PAGINA_RE.captures(&text) {
            info.current_page = caps[1].parse().unwrap_or(1);
            info.total_pages = caps[2].parse().unwrap_or(info.current_page);
        }
    }

    if info.has_more() {
        let next_label = (info.current_page + 1).to_string();
        info.next_page_hint = grid
            .select(&PAGER_ITEM)
            .find(|item| element_text(*item) == next_label)
            .and_then(|item| item.value().attr("onclick").map(str::to_string));
    }

    info
}

/// Pull the `q` query parameter out of a detail-page href, URL-decoded.
/// Handles absolute and relative links; malformed hrefs yield `None`.
#[must_use]
pub fn extract_q_param(href: &str) -> Option<String> {
    let url = Url::parse(href)
        .or_else(|_| Url::parse(PORTAL_BASE).and_then(|base| base.join(href)))
        .ok()?;

    let q = url
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())?;

    (!q.is_empty()).then_some(q)
}

/// Whether `element` contains an `<a>` whose href mentions `pattern`.
pub(crate) fn has_link(element: ElementRef<'_>, pattern: &str) -> bool {
    element
        .select(&ANY_LINK)
        .any(|a| a.value().attr("href").is_some_and(|h| h.contains(pattern)))
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid_page(rows: &str, pager: &str) -> String {
        format!(
            r#"<html><body><div id="gridResultados"><table class="dxgvTable">
            {rows}
            </table>{pager}</div></body></html>"#
        )
    }

    fn row(q: &str, title: &str) -> String {
        format!(
            r#"<tr class="dxgvDataRow">
            <td><a href="wfOrdenamientoDetalle.aspx?q={q}">{title}</a></td>
            <td>01/04/1970</td><td>23/12/1969</td>
            <td>VIGENTE</td><td>LEY FEDERAL</td><td>FEDERAL</td>
            <td><a href="AbrirDocReforma.aspx?q={q}">PDF</a></td>
            </tr>"#
        )
    }

    #[test]
    fn parses_data_rows() {
        let html = grid_page(
            &format!(
                "{}{}",
                row("AbC123%3D%3D", "LEY FEDERAL DEL TRABAJO"),
                row("XyZ987%3D%3D", "CÓDIGO CIVIL FEDERAL")
            ),
            "",
        );
        let items = parse_search_results(&html).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].q_param, "AbC123==");
        assert_eq!(items[0].title, "LEY FEDERAL DEL TRABAJO");
        assert_eq!(items[0].publication_date.as_deref(), Some("01/04/1970"));
        assert_eq!(items[0].status, "VIGENTE");
        assert_eq!(items[0].category, "LEY FEDERAL");
        assert_eq!(items[0].scope, "FEDERAL");
        assert!(items[0].has_pdf);
        assert!(!items[0].has_extract);
        assert_eq!(items[1].title, "CÓDIGO CIVIL FEDERAL");
    }

    #[test]
    fn missing_grid_is_shape_error() {
        let err = parse_search_results("<html><body><p>mantenimiento</p></body></html>")
            .unwrap_err();
        let ParserError::Shape { snippet, .. } = err;
        assert!(snippet.contains("mantenimiento"));
    }

    #[test]
    fn no_results_marker_yields_empty() {
        let html = grid_page(
            r#"<tr class="dxgvEmptyDataRow"><td>No se encontraron registros</td></tr>"#,
            "",
        );
        assert_eq!(parse_search_results(&html).unwrap(), vec![]);
    }

    #[test]
    fn empty_grid_is_not_an_error() {
        let html = grid_page("", "");
        assert_eq!(parse_search_results(&html).unwrap(), vec![]);
    }

    #[test]
    fn rows_without_detail_link_are_skipped() {
        let bad = r#"<tr class="dxgvDataRow">
            <td>sin enlace</td><td></td><td></td><td></td><td></td><td></td>
            </tr>"#;
        let html = grid_page(&format!("{}{}", bad, row("Ok%3D%3D", "LEY DE AMPARO")), "");
        let items = parse_search_results(&html).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].q_param, "Ok==");
    }

    #[test]
    fn malformed_q_param_drops_row() {
        let bad = r#"<tr class="dxgvDataRow">
            <td><a href="wfOrdenamientoDetalle.aspx?other=1">LEY X</a></td>
            <td></td><td></td><td></td><td></td><td></td>
            </tr>"#;
        let html = grid_page(bad, "");
        assert_eq!(parse_search_results(&html).unwrap(), vec![]);
    }

    #[test]
    fn parsing_twice_is_deterministic() {
        let html = grid_page(&row("AbC%3D%3D", "LEY GENERAL DE SALUD"), "");
        assert_eq!(
            parse_search_results(&html).unwrap(),
            parse_search_results(&html).unwrap()
        );
    }

    #[test]
    fn pagination_with_more_pages() {
        let pager = r#"<div class="dxpPagerTotal">Página 2 de 14</div>
            <span class="dxpPagerItem" onclick="ASPx.GVPagerOnClick('grid','PN2');">3</span>"#;
        let html = grid_page("", pager);
        let info = extract_pagination(&html);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.total_pages, 14);
        assert!(info.has_more());
        assert!(info.next_page_hint.unwrap().contains("PN2"));
    }

    #[test]
    fn pagination_is_accent_and_case_insensitive() {
        let html = grid_page("", r#"<div class="dxpPagerTotal">PAGINA 1 de 1</div>"#);
        let info = extract_pagination(&html);
        assert_eq!((info.current_page, info.total_pages), (1, 1));
        assert!(!info.has_more());
    }

    #[test]
    fn pagination_defaults_when_pager_missing() {
        let info = extract_pagination("<html><body></body></html>");
        assert_eq!((info.current_page, info.total_pages), (1, 1));
        assert_eq!(info.next_page_hint, None);
    }

    #[test]
    fn q_param_extraction_variants() {
        assert_eq!(
            extract_q_param("wfOrdenamientoDetalle.aspx?q=AbC%3D%3D"),
            Some("AbC==".to_string())
        );
        assert_eq!(
            extract_q_param(
                "https://legislacion.scjn.gob.mx/Buscador/Paginas/wfOrdenamientoDetalle.aspx?x=1&q=Zz9"
            ),
            Some("Zz9".to_string())
        );
        assert_eq!(extract_q_param("wfOrdenamientoDetalle.aspx"), None);
        assert_eq!(extract_q_param(""), None);
    }
}
