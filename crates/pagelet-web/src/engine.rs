use crate::config::SiteConfig;
use crate::error::{PageError, PageResult};
use crate::nav;
use crate::template::{self, TemplateModel};
use pagelet_core::{PageOutput, PageRequest, run_page};
use percent_encoding::percent_decode_str;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A request path resolved to an existing page script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub name: String,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub html: String,
    pub source: PathBuf,
    pub pages: Vec<String>,
    pub loader_ran: bool,
}

/// The stages of the per-request pipeline.
///
/// `render_request` chains them: resolve, evaluate and run hooks, list pages,
/// compose. The first failing stage ends the request.
pub trait PageletCore {
    fn match_route(&self, url: &str) -> PageResult<PageRoute>;
    fn execute_page(&self, route: &PageRoute, request: &PageRequest) -> PageResult<PageOutput>;
    fn list_pages(&self) -> Vec<String>;
    fn compose(&self, model: &TemplateModel<'_>) -> PageResult<String>;

    fn render_request(&self, request: &PageRequest) -> PageResult<RenderOutput> {
        let route = self.match_route(&request.path)?;
        let output = self.execute_page(&route, request)?;
        let pages = self.list_pages();
        let html = self.compose(&TemplateModel {
            content: &output.html,
            pages: &pages,
            path: &request.path,
        })?;
        Ok(RenderOutput {
            html,
            source: route.file_path,
            pages,
            loader_ran: output.loader_ran,
        })
    }
}

/// Stateless apart from its configuration; safe to share across workers.
#[derive(Debug, Clone)]
pub struct PageletEngine {
    config: SiteConfig,
}

impl PageletEngine {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn load_script(&self, route: &PageRoute) -> PageResult<String> {
        fs::read_to_string(&route.file_path).map_err(|source| PageError::Io {
            path: route.file_path.clone(),
            source,
        })
    }
}

impl PageletCore for PageletEngine {
    fn match_route(&self, url: &str) -> PageResult<PageRoute> {
        let name = page_name(url, &self.config.index_page)
            .ok_or_else(|| PageError::not_found(url))?;
        let file_path = resolve_script_path(
            &self.config.root_path,
            &name,
            &self.config.script_extension,
        )?
        .ok_or_else(|| PageError::not_found(url))?;
        debug!(url, page = %name, file = %file_path.display(), "route matched");
        Ok(PageRoute { name, file_path })
    }

    fn execute_page(&self, route: &PageRoute, request: &PageRequest) -> PageResult<PageOutput> {
        let source = self.load_script(route)?;
        let output = run_page(&source, request, self.config.script_limits())?;
        debug!(
            page = %route.name,
            loader_ran = output.loader_ran,
            bytes = output.html.len(),
            "page rendered"
        );
        Ok(output)
    }

    fn list_pages(&self) -> Vec<String> {
        nav::list_pages(&self.config)
    }

    fn compose(&self, model: &TemplateModel<'_>) -> PageResult<String> {
        Ok(template::compose(&self.config.template_path(), model)?)
    }
}

/// Percent-decodes a raw URL path. Invalid UTF-8 is replaced lossily and
/// malformed escapes are kept as written.
pub fn decode_url_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Maps a decoded URL path to a page name: `/` is the index page, anything else
/// loses its leading slash. Paths that could escape the content root yield
/// `None`.
fn page_name(url: &str, index_page: &str) -> Option<String> {
    if url.is_empty() || url == "/" {
        return Some(index_page.to_string());
    }
    let trimmed = url.strip_prefix('/').unwrap_or(url);
    let rel = Path::new(trimmed);
    for comp in rel.components() {
        if !matches!(comp, Component::Normal(_)) {
            return None;
        }
    }
    Some(trimmed.to_string())
}

/// `Ok(None)` when no regular file backs the page. Stat failures other than
/// a missing path are I/O errors.
fn resolve_script_path(
    root: &Path,
    name: &str,
    extension: &str,
) -> PageResult<Option<PathBuf>> {
    let candidate = root.join(format!("{name}.{extension}"));
    match fs::metadata(&candidate) {
        Ok(meta) => Ok(meta.is_file().then_some(candidate)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
        Err(source) => Err(PageError::Io {
            path: candidate,
            source,
        }),
    }
}
