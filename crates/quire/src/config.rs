//! Configuration file (quire.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quire_static::{
    BundleConfig, CopyRule, ImageConfig, PagesConfig, ScriptConfig, SiteConfig, StyleConfig,
};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "quire.toml";

const DEFAULT_PORT: u16 = 3000;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    site: SiteSection,
    pages: PagesSection,
    style: StyleSection,
    images: ImagesSection,
    scripts: ScriptsSection,
    bundle: BundleSection,
    copy: Option<Vec<CopyRule>>,
    server: ServerSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SiteSection {
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    template: Option<PathBuf>,
    license: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PagesSection {
    extension: Option<String>,
    exclude: Option<Vec<String>>,
    toc_max: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct StyleSection {
    source: Option<PathBuf>,
    browsers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ImagesSection {
    source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ScriptsSection {
    source: Option<PathBuf>,
    lint: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct BundleSection {
    entry: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    port: Option<u16>,
}

/// Resolved settings for every command.
#[derive(Debug)]
pub struct Settings {
    pub site: SiteConfig,
    pub port: u16,
}

/// Load settings from `path`. A missing file means defaults.
pub fn load(path: &Path) -> Result<Settings> {
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_CONFIG_FILE);

    let file = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file = parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        file
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        ConfigFile::default()
    };

    Ok(file.resolve(&root, file_name))
}

fn parse(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

impl ConfigFile {
    /// Turn the file into stage configs with paths under `root`.
    fn resolve(self, root: &Path, config_file: &str) -> Settings {
        let source = root.join(self.site.source.unwrap_or_else(|| PathBuf::from("app")));
        let output = root.join(self.site.output.unwrap_or_else(|| PathBuf::from("dist")));
        let license = self.site.license;

        let page_defaults = PagesConfig::default();
        let pages = PagesConfig {
            source_dir: source.clone(),
            output_dir: output.clone(),
            template_path: root.join(self.site.template.unwrap_or(page_defaults.template_path)),
            extension: self.pages.extension.unwrap_or(page_defaults.extension),
            exclude: self.pages.exclude.unwrap_or(page_defaults.exclude),
            toc_max: self.pages.toc_max.unwrap_or(page_defaults.toc_max),
        };

        let style = StyleConfig {
            source_dir: self
                .style
                .source
                .map(|s| root.join(s))
                .unwrap_or_else(|| source.join("sass")),
            output_dir: output.join("css"),
            browsers: self
                .style
                .browsers
                .unwrap_or_else(|| StyleConfig::default().browsers),
            license: license.clone(),
            minify: true,
        };

        let images = ImageConfig {
            source_dir: self
                .images
                .source
                .map(|s| root.join(s))
                .unwrap_or_else(|| source.join("images")),
            output_dir: output.join("images"),
        };

        let scripts = ScriptConfig {
            source_dir: self
                .scripts
                .source
                .map(|s| root.join(s))
                .unwrap_or_else(|| source.join("js")),
            output_dir: output.join("js"),
            lint_roots: match self.scripts.lint {
                Some(roots) => roots.into_iter().map(|r| root.join(r)).collect(),
                None => vec![source.join("js"), source.join("elements")],
            },
            license: license.clone(),
        };

        let bundle = BundleConfig {
            entry: self
                .bundle
                .entry
                .map(|e| root.join(e))
                .unwrap_or_else(|| source.join("elements/elements.html")),
            output_dir: output.join("elements"),
            license,
            minify: true,
        };

        let site = SiteConfig {
            root: root.to_path_buf(),
            output_dir: output.clone(),
            clean_paths: vec![output, source.join("css")],
            fail_on_lint: true,
            pages,
            style,
            images,
            scripts,
            bundle,
            copy: self
                .copy
                .unwrap_or_else(|| CopyRule::defaults(config_file)),
        };

        Settings {
            site,
            port: self.server.port.unwrap_or(DEFAULT_PORT),
        }
    }
}
