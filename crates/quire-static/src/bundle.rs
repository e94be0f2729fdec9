//! HTML import bundling.
//!
//! Flattens an HTML import graph into one document, then splits the inline
//! scripts out into a sibling `.js` file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::assets::license_banner;
use crate::error::BuildError;
use crate::output::write_atomic;
use crate::scripts::{inline_script_re, is_inline_javascript, minify_js};

/// Configuration for the bundle stage.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Entry HTML document
    pub entry: PathBuf,

    /// Output directory for the bundle
    pub output_dir: PathBuf,

    /// Organization named in the script license banner
    pub license: Option<String>,

    /// Minify HTML and JS output
    pub minify: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("app/elements/elements.html"),
            output_dir: PathBuf::from("dist/elements"),
            license: None,
            minify: true,
        }
    }
}

/// A bundled document split into markup and script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub html: String,
    pub js: String,
}

fn comment_re() -> &'static Regex {
    static COMMENT_RE: OnceLock<Regex> = OnceLock::new();
    COMMENT_RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"))
}

fn resource_re() -> &'static Regex {
    static RESOURCE_RE: OnceLock<Regex> = OnceLock::new();
    RESOURCE_RE.get_or_init(|| {
        Regex::new(r"(?is)<link\b([^>]*)>|<script\b([^>]*)>\s*</script\s*>")
            .expect("valid resource regex")
    })
}

fn attr_re() -> &'static Regex {
    static ATTR_RE: OnceLock<Regex> = OnceLock::new();
    ATTR_RE.get_or_init(|| {
        Regex::new(r#"([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("valid attribute regex")
    })
}

/// Value of attribute `name` in a tag's attribute text.
fn attr<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attr_re().captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
    })
}

fn is_local(href: &str) -> bool {
    !(href.is_empty()
        || href.starts_with("//")
        || href.starts_with('#')
        || href.contains("://")
        || href.starts_with("data:"))
}

/// Inline imports, stylesheets and external scripts reachable from `entry`.
///
/// Every document is inlined at its first import only, which also ends
/// import cycles. Comments are removed.
pub fn vulcanize(entry: &Path) -> Result<String, BuildError> {
    let mut seen = HashSet::new();
    inline_document(entry, &mut seen)
}

fn inline_document(path: &Path, seen: &mut HashSet<PathBuf>) -> Result<String, BuildError> {
    let key = fs::canonicalize(path).map_err(BuildError::read(path))?;
    if !seen.insert(key) {
        return Ok(String::new());
    }

    let source = fs::read_to_string(path).map_err(BuildError::read(path))?;
    let source = comment_re().replace_all(&source, "");
    let dir = path.parent().unwrap_or(Path::new(""));

    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in resource_re().captures_iter(&source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&source[last..whole.start()]);
        last = whole.end();

        match inline_resource(path, dir, &caps, seen)? {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(whole.as_str()),
        }
    }
    out.push_str(&source[last..]);

    Ok(out)
}

/// Replacement text for a `<link>` or empty `<script>` tag, if it is inlined.
fn inline_resource(
    importer: &Path,
    dir: &Path,
    caps: &Captures<'_>,
    seen: &mut HashSet<PathBuf>,
) -> Result<Option<String>, BuildError> {
    let read_local = |href: &str| -> Result<(PathBuf, String), BuildError> {
        let target = dir.join(href);
        match fs::read_to_string(&target) {
            Ok(content) => Ok((target, content)),
            Err(_) => Err(BuildError::Import {
                path: importer.to_path_buf(),
                href: href.to_string(),
            }),
        }
    };

    if let Some(link) = caps.get(1) {
        let attrs = link.as_str();
        let Some(href) = attr(attrs, "href").filter(|h| is_local(h)) else {
            return Ok(None);
        };

        return match attr(attrs, "rel").map(str::to_ascii_lowercase).as_deref() {
            Some("import") => {
                let target = dir.join(href);
                if !target.exists() {
                    return Err(BuildError::Import {
                        path: importer.to_path_buf(),
                        href: href.to_string(),
                    });
                }
                inline_document(&target, seen).map(Some)
            }
            Some("stylesheet") => {
                let (_, css) = read_local(href)?;
                Ok(Some(format!("<style>{}</style>", css)))
            }
            _ => Ok(None),
        };
    }

    if let Some(script) = caps.get(2) {
        let attrs = script.as_str();
        let Some(src) = attr(attrs, "src").filter(|s| is_local(s)) else {
            return Ok(None);
        };
        let (_, js) = read_local(src)?;
        return Ok(Some(format!("<script>{}</script>", js)));
    }

    Ok(None)
}

/// Move inline scripts into one script file referenced as `script_name`.
pub fn crisper(html: &str, script_name: &str) -> Bundle {
    let mut scripts = Vec::new();

    let stripped = inline_script_re().replace_all(html, |caps: &Captures<'_>| {
        if is_inline_javascript(&caps[1]) {
            let body = caps[2].trim();
            if !body.is_empty() {
                scripts.push(body.to_string());
            }
            String::new()
        } else {
            caps[0].to_string()
        }
    });

    let tag = format!("<script src=\"{}\"></script>", script_name);
    let html = match stripped.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &stripped[..pos], tag, &stripped[pos..]),
        None => format!("{}{}\n", stripped, tag),
    };

    let js = scripts
        .iter()
        .map(|s| format!("{}\n", s.trim_end_matches(';')))
        .collect::<Vec<_>>()
        .join(";\n");

    Bundle { html, js }
}

/// Minify HTML markup.
pub fn minify_html(html: &str) -> String {
    let cfg = minify_html::Cfg {
        keep_closing_tags: true,
        keep_html_and_head_opening_tags: true,
        keep_comments: false,
        ..minify_html::Cfg::default()
    };

    let minified = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8_lossy(&minified).into_owned()
}

/// Bundle the entry document into `<stem>.html` and `<stem>.js`.
pub fn build_bundle(config: &BundleConfig) -> Result<(PathBuf, PathBuf), BuildError> {
    let stem = config
        .entry
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bundle")
        .to_string();
    let script_name = format!("{}.js", stem);

    let flattened = vulcanize(&config.entry)?;
    let Bundle { html, js } = crisper(&flattened, &script_name);

    let html_path = config.output_dir.join(format!("{}.html", stem));
    let js_path = config.output_dir.join(&script_name);

    let (html, js) = if config.minify {
        let js = minify_js(&js).map_err(|message| BuildError::Script {
            path: js_path.clone(),
            message,
        })?;
        (minify_html(&html), js)
    } else {
        (html, js)
    };

    let js = match &config.license {
        Some(org) => format!("{}{}", license_banner(org), js),
        None => js,
    };

    write_atomic(&html_path, html)?;
    write_atomic(&js_path, js)?;

    Ok((html_path, js_path))
}
