use std::{collections::HashMap, fmt::Display, path::PathBuf};

use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use pcc_package::{read::LoadOptions, Package};
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Tables and payload sizes
    #[default]
    Semantic,
    /// Also show the lines of the name table that changed
    Full,
}

#[derive(Debug, Eq, PartialEq, PartialOrd, Ord)]
enum Change {
    Added(String),
    Removed(String),
    Comparison(String, String, String),
    Context(Vec<String>),
    Modified(String, Vec<Change>),
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(v) => writeln!(f, "✅ {}", v.green()),
            Change::Removed(v) => writeln!(f, "❌ {}", v.red()),
            Change::Comparison(key, old, new) => {
                writeln!(f, "* {}: {} vs {}", key, old.red(), new.green())
            }
            Change::Context(lines) => writeln!(f, "{}", lines.iter().map(|l| format!(" {l}")).join("\n")),
            Change::Modified(v, children) => {
                writeln!(f, "🔃 {}", v.blue())?;
                let body = children.iter().map(|c| c.to_string()).join("");
                writeln!(
                    f,
                    "{}",
                    body.split('\n')
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| format!("  {l}"))
                        .join("\n")
                )
            }
        }
    }
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input package
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input package
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Semantic)]
    mode: Mode,
}

impl DiffArgs {
    fn handle_header(&self, left: &Package, right: &Package) -> Vec<Change> {
        let mut result = Vec::new();

        let mut compare = |key: &str, old: String, new: String| {
            if old != new {
                result.push(Change::Comparison(key.into(), old, new));
            }
        };

        compare("game", left.game().to_string(), right.game().to_string());
        compare("platform", left.platform().to_string(), right.platform().to_string());
        compare(
            "version",
            format!("{}/{}", left.unreal_version(), left.licensee_version()),
            format!("{}/{}", right.unreal_version(), right.licensee_version()),
        );
        compare(
            "flags",
            format!("{:#010X}", left.flags().bits()),
            format!("{:#010X}", right.flags().bits()),
        );
        compare(
            "guid",
            left.package_guid().to_string(),
            right.package_guid().to_string(),
        );

        result
    }

    fn handle_names(&self, left: &Package, right: &Package) -> Option<Change> {
        let old = left.names().join("\n");
        let new = right.names().join("\n");

        let diff = TextDiff::from_lines(&old, &new);
        if diff.ratio() >= 1.0 {
            return None;
        }

        let mut children = Vec::new();
        for change in diff.iter_all_changes() {
            let value = change.value().trim_end().to_string();
            match change.tag() {
                ChangeTag::Insert => children.push(Change::Added(value)),
                ChangeTag::Delete => children.push(Change::Removed(value)),
                ChangeTag::Equal => {}
            }
        }

        if self.mode == Mode::Full {
            let mut context = Vec::new();
            for op in diff.ops() {
                for change in diff.iter_inline_changes(op) {
                    let mut line = String::new();
                    for (emphasized, value) in change.iter_strings_lossy() {
                        let value = value.trim_end_matches('\n');
                        match (emphasized, change.tag()) {
                            (true, ChangeTag::Insert) => {
                                line.push_str(&format!("{}", value.green().underline()))
                            }
                            (true, _) => line.push_str(&format!("{}", value.red().underline())),
                            (false, _) => line.push_str(&format!("{}", value.dimmed())),
                        }
                    }
                    context.push(line);
                }
            }
            children.push(Change::Context(context));
        }

        Some(Change::Modified("names".into(), children))
    }

    fn handle_exports(&self, left: &Package, right: &Package) -> Option<Change> {
        let payloads = |package: &Package| -> HashMap<String, Option<Vec<u8>>> {
            package
                .exports()
                .iter()
                .map(|e| (package.full_path(e), e.data().map(<[u8]>::to_vec)))
                .collect()
        };
        let left_exports = payloads(left);
        let right_exports = payloads(right);

        let mut children = Vec::new();
        for path in left_exports.keys().chain(right_exports.keys()).unique().sorted() {
            match (left_exports.get(path), right_exports.get(path)) {
                (None, Some(_)) => children.push(Change::Added(path.clone())),
                (Some(_), None) => children.push(Change::Removed(path.clone())),
                (Some(old), Some(new)) if old != new => {
                    let size = |data: &Option<Vec<u8>>| data.as_ref().map_or(0, Vec::len).to_string();
                    children.push(Change::Modified(
                        path.clone(),
                        vec![Change::Comparison("size".into(), size(old), size(new))],
                    ));
                }
                _ => {}
            }
        }

        (!children.is_empty()).then(|| Change::Modified("exports".into(), children))
    }

    pub fn handle(&self) -> Result<()> {
        let left = super::open(&self.left, LoadOptions::default())?;
        let right = super::open(&self.right, LoadOptions::default())?;

        let mut changes = self.handle_header(&left, &right);
        changes.extend(self.handle_names(&left, &right));
        changes.extend(self.handle_exports(&left, &right));

        if !changes.is_empty() {
            println!(
                "{}",
                Change::Modified(self.left.to_string_lossy().into_owned(), changes)
            );
        }

        Ok(())
    }
}
