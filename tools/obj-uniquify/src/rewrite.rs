//! Scene rewriter (OBJ + MTL text -> per-object material names)
//!
//! Works on raw text: every line except `usemtl` is copied byte for byte, line
//! endings included. Each material usage is renamed according to the
//! [`NamingStrategy`] and the MTL is rebuilt from copies of the original
//! blocks, with only the `newmtl` line renamed.

use anyhow::{Context, Result, bail};
use hashbrown::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::NamingStrategy;

const MTLLIB: &str = "mtllib ";
const OBJECT: &str = "o ";
const USEMTL: &str = "usemtl ";
const NEWMTL: &str = "newmtl ";

/// Rewrite failures that are not I/O
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("line {line}: `usemtl {material}` appears before any object declaration")]
    UsageBeforeObject { line: usize, material: String },
}

/// An original material and the name its usage was rewritten to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialUsage {
    pub original: String,
    pub assigned: String,
}

impl MaterialUsage {
    pub fn new(original: impl Into<String>, assigned: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            assigned: assigned.into(),
        }
    }
}

/// Rewritten scene text and what was learned while rewriting it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenScene {
    /// Output lines, each with its original line ending
    pub lines: Vec<String>,
    /// `mtllib` file name (the last one wins if repeated)
    pub material_library: Option<String>,
    /// Distinct usages, in first-seen order
    pub usages: Vec<MaterialUsage>,
}

impl RewrittenScene {
    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Files produced by [`rewrite_scene`]
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    pub scene: RewrittenScene,
    pub scene_path: PathBuf,
    /// Duplicated MTL blocks, in usage order
    pub material_lines: Vec<String>,
    pub material_path: Option<PathBuf>,
    /// Original materials referenced by the scene but absent from the library
    pub missing_materials: Vec<String>,
}

struct Renamer {
    strategy: NamingStrategy,
    counters: HashMap<String, usize>,
}

impl Renamer {
    fn new(strategy: NamingStrategy) -> Self {
        Self {
            strategy,
            counters: HashMap::new(),
        }
    }

    fn assign(
        &mut self,
        original: &str,
        object: Option<&str>,
        line: usize,
    ) -> std::result::Result<String, RewriteError> {
        match self.strategy {
            NamingStrategy::PerObject => {
                object
                    .map(str::to_string)
                    .ok_or_else(|| RewriteError::UsageBeforeObject {
                        line,
                        material: original.to_string(),
                    })
            }
            NamingStrategy::PerMaterial => {
                let n = match self.counters.get_mut(original) {
                    Some(count) => {
                        *count += 1;
                        *count
                    }
                    None => {
                        self.counters.insert(original.to_string(), 0);
                        0
                    }
                };
                Ok(format!("{}_{}", original, n))
            }
        }
    }
}

/// Rewrite OBJ text in memory
pub fn rewrite_scene_text(
    text: &str,
    strategy: NamingStrategy,
) -> std::result::Result<RewrittenScene, RewriteError> {
    let mut scene = RewrittenScene::default();
    let mut renamer = Renamer::new(strategy);
    let mut seen: HashSet<MaterialUsage> = HashSet::new();
    let mut active_object: Option<String> = None;

    for (i, line) in text.split_inclusive('\n').enumerate() {
        let stripped = line.trim();

        if let Some(name) = directive(stripped, MTLLIB) {
            if let Some(previous) = scene.material_library.as_deref().filter(|p| *p != name) {
                tracing::warn!(
                    "Line {}: mtllib {} replaces earlier mtllib {}",
                    i + 1,
                    name,
                    previous
                );
            }
            scene.material_library = Some(name.to_string());
            scene.lines.push(line.to_string());
        } else if let Some(name) = directive(stripped, OBJECT) {
            active_object = Some(name.to_string());
            scene.lines.push(line.to_string());
        } else if let Some(original) = directive(stripped, USEMTL) {
            let assigned = renamer.assign(original, active_object.as_deref(), i + 1)?;
            tracing::debug!("Line {}: usemtl {} -> {}", i + 1, original, assigned);
            scene
                .lines
                .push(format!("usemtl {}{}", assigned, line_ending(line)));

            let usage = MaterialUsage::new(original, assigned);
            if seen.insert(usage.clone()) {
                scene.usages.push(usage);
            }
        } else {
            scene.lines.push(line.to_string());
        }
    }

    Ok(scene)
}

/// Rewrite `input`, writing the scene to `intermediate` and the duplicated
/// material library beside it under the original `mtllib` file name.
pub fn rewrite_scene(
    input: &Path,
    intermediate: &Path,
    strategy: NamingStrategy,
) -> Result<RewriteOutput> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let scene = rewrite_scene_text(&text, strategy)
        .with_context(|| format!("Failed to rewrite {:?}", input))?;

    if same_file(input, intermediate) {
        bail!(
            "Intermediate scene {:?} would overwrite the input scene",
            intermediate
        );
    }

    let library_paths = scene.material_library.as_ref().map(|name| {
        (
            parent_dir(input).join(name),
            parent_dir(intermediate).join(name),
        )
    });

    if let Some((source, target)) = &library_paths {
        if same_file(source, target) {
            bail!(
                "Rewritten material library {:?} would overwrite its source; \
                use an intermediate path in another directory",
                target
            );
        }
    }

    fs::write(intermediate, scene.text())
        .with_context(|| format!("Failed to write intermediate OBJ: {:?}", intermediate))?;
    tracing::info!(
        "Rewrote {} material usages into {:?}",
        scene.usages.len(),
        intermediate
    );

    let mut output = RewriteOutput {
        scene,
        scene_path: intermediate.to_path_buf(),
        material_lines: Vec::new(),
        material_path: None,
        missing_materials: Vec::new(),
    };

    let Some((source, target)) = library_paths else {
        tracing::debug!("No mtllib in {:?}, skipping material library", input);
        return Ok(output);
    };

    let library = MaterialLibrary::load(&source)?;
    let duplicated = library.duplicate(&output.scene.usages);

    fs::write(&target, duplicated.lines.concat())
        .with_context(|| format!("Failed to write material library: {:?}", target))?;
    tracing::info!(
        "Wrote {} material blocks to {:?}",
        output.scene.usages.len() - duplicated.skipped,
        target
    );

    output.material_lines = duplicated.lines;
    output.material_path = Some(target);
    output.missing_materials = duplicated.missing;
    Ok(output)
}

/// MTL blocks keyed by material name, kept verbatim
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    blocks: HashMap<String, Vec<String>>,
}

/// Result of [`MaterialLibrary::duplicate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicatedLibrary {
    pub lines: Vec<String>,
    /// Distinct original names with no block
    pub missing: Vec<String>,
    /// Usages whose block was skipped
    pub skipped: usize,
}

impl MaterialLibrary {
    /// Split MTL text into blocks.
    ///
    /// A block starts at its `newmtl` line and runs to the next one. Text
    /// before the first `newmtl` belongs to no block; a repeated name keeps
    /// its last block.
    pub fn parse(text: &str) -> Self {
        let mut blocks = HashMap::new();
        let mut current: Option<(String, Vec<String>)> = None;

        for line in text.split_inclusive('\n') {
            if let Some(name) = directive(line.trim(), NEWMTL) {
                if let Some((name, block)) = current.take() {
                    blocks.insert(name, block);
                }
                current = Some((name.to_string(), vec![line.to_string()]));
            } else if let Some((_, block)) = &mut current {
                block.push(line.to_string());
            }
        }

        if let Some((name, block)) = current {
            blocks.insert(name, block);
        }

        Self { blocks }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to open material library: {:?}", path))?;
        Ok(Self::parse(&text))
    }

    pub fn block(&self, name: &str) -> Option<&[String]> {
        self.blocks.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Copy the block of every usage's original material under its assigned name.
    ///
    /// Missing originals are logged and skipped. Assigned names declared by
    /// more than one block are logged as well.
    pub fn duplicate(&self, usages: &[MaterialUsage]) -> DuplicatedLibrary {
        let mut out = DuplicatedLibrary::default();
        let mut declared: HashMap<&str, usize> = HashMap::new();

        for usage in usages {
            let Some(block) = self.block(&usage.original) else {
                tracing::warn!(
                    "Original material {} not found in material library",
                    usage.original
                );
                out.skipped += 1;
                if !out.missing.contains(&usage.original) {
                    out.missing.push(usage.original.clone());
                }
                continue;
            };

            let ending = match line_ending(&block[0]) {
                "" => "\n",
                ending => ending,
            };
            let start = out.lines.len();
            out.lines
                .push(format!("newmtl {}{}", usage.assigned, ending));
            out.lines.extend(block[1..].iter().cloned());

            // Keep the next declaration on its own line
            if let Some(last) = out.lines[start..].last_mut() {
                if !last.ends_with('\n') {
                    last.push('\n');
                }
            }

            *declared.entry(usage.assigned.as_str()).or_insert(0) += 1;
        }

        let mut redundant: Vec<_> = declared.into_iter().filter(|(_, n)| *n > 1).collect();
        redundant.sort();
        for (name, count) in redundant {
            tracing::warn!("Material {} is declared by {} blocks", name, count);
        }

        out
    }
}

fn directive<'a>(stripped: &'a str, prefix: &str) -> Option<&'a str> {
    stripped.strip_prefix(prefix).map(str::trim)
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Directory of `path`, `.` for bare file names
pub(crate) fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Whether writing `target` would replace the existing file `existing`
fn same_file(existing: &Path, target: &Path) -> bool {
    let Ok(existing) = fs::canonicalize(existing) else {
        return false;
    };
    let Some(file_name) = target.file_name() else {
        return false;
    };
    fs::canonicalize(parent_dir(target))
        .map(|dir| dir.join(file_name) == existing)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LEAVES_OBJ: &str = "\
# leaves
mtllib tree.mtl
v 0 0 0
v 1 0 0
v 0 1 0
o Leaf1
usemtl Bark
f 1 2 3
usemtl Leaf
f 3 2 1
o Leaf2
usemtl Bark
f 1 3 2
";

    const TREE_MTL: &str = "\
# Blender MTL File
newmtl Bark
Ns 10.0
Kd 0.40 0.25 0.10

newmtl Leaf
Kd 0.10 0.60 0.10
map_Kd leaf.png
";

    fn usage(original: &str, assigned: &str) -> MaterialUsage {
        MaterialUsage::new(original, assigned)
    }

    #[test]
    fn test_per_object_rewrite() {
        let scene = rewrite_scene_text(LEAVES_OBJ, NamingStrategy::PerObject).unwrap();

        assert_eq!(scene.material_library.as_deref(), Some("tree.mtl"));
        assert_eq!(
            scene.usages,
            vec![
                usage("Bark", "Leaf1"),
                usage("Leaf", "Leaf1"),
                usage("Bark", "Leaf2"),
            ]
        );

        let text = scene.text();
        assert_eq!(text.matches("usemtl Leaf1\n").count(), 2);
        assert_eq!(text.matches("usemtl Leaf2\n").count(), 1);
        assert!(!text.contains("usemtl Bark"));
        // Everything else is untouched
        assert_eq!(scene.lines.len(), LEAVES_OBJ.lines().count());
        assert!(text.starts_with("# leaves\nmtllib tree.mtl\nv 0 0 0\n"));
    }

    #[test]
    fn test_objects_never_share_assigned_names() {
        let scene = rewrite_scene_text(LEAVES_OBJ, NamingStrategy::PerObject).unwrap();

        let leaf1: HashSet<&str> = scene.usages[..2].iter().map(|u| u.assigned.as_str()).collect();
        let leaf2: HashSet<&str> = scene.usages[2..].iter().map(|u| u.assigned.as_str()).collect();
        assert!(leaf1.is_disjoint(&leaf2));
        // Same original material, split across objects
        assert_eq!(scene.usages[0].original, scene.usages[2].original);
    }

    #[test]
    fn test_per_material_rewrite() {
        let scene = rewrite_scene_text(LEAVES_OBJ, NamingStrategy::PerMaterial).unwrap();

        assert_eq!(
            scene.usages,
            vec![
                usage("Bark", "Bark_0"),
                usage("Leaf", "Leaf_0"),
                usage("Bark", "Bark_1"),
            ]
        );
    }

    #[test]
    fn test_usage_before_object_fails() {
        let err = rewrite_scene_text("v 0 0 0\nusemtl Bark\no A\n", NamingStrategy::PerObject)
            .unwrap_err();

        let RewriteError::UsageBeforeObject { line, material } = err;
        assert_eq!(line, 2);
        assert_eq!(material, "Bark");

        // Counter naming does not need an object
        let scene =
            rewrite_scene_text("usemtl Bark\no A\n", NamingStrategy::PerMaterial).unwrap();
        assert_eq!(scene.usages, vec![usage("Bark", "Bark_0")]);
    }

    #[test]
    fn test_line_endings_preserved() {
        let scene = rewrite_scene_text(
            "o A\r\nusemtl Bark\r\nf 1 2 3",
            NamingStrategy::PerObject,
        )
        .unwrap();

        assert_eq!(scene.lines, vec!["o A\r\n", "usemtl A\r\n", "f 1 2 3"]);
    }

    #[test]
    fn test_repeated_usage_recorded_once() {
        let scene = rewrite_scene_text(
            "o A\nusemtl Bark\nf 1 2 3\nusemtl Bark\nf 1 2 3\n",
            NamingStrategy::PerObject,
        )
        .unwrap();
        assert_eq!(scene.usages, vec![usage("Bark", "A")]);
    }

    #[test]
    fn test_library_blocks() {
        let library = MaterialLibrary::parse(TREE_MTL);

        assert_eq!(library.len(), 2);
        assert_eq!(
            library.block("Bark").unwrap(),
            ["newmtl Bark\n", "Ns 10.0\n", "Kd 0.40 0.25 0.10\n", "\n"]
        );
        assert_eq!(library.block("Leaf").unwrap().len(), 3);
        assert!(library.block("# Blender MTL File").is_none());
    }

    #[test]
    fn test_library_repeated_name_keeps_last() {
        let library = MaterialLibrary::parse("newmtl A\nKd 1 0 0\nnewmtl A\nKd 0 1 0\n");
        assert_eq!(library.block("A").unwrap(), ["newmtl A\n", "Kd 0 1 0\n"]);
    }

    #[test]
    fn test_duplicate_scenario_blocks() {
        let library = MaterialLibrary::parse(TREE_MTL);
        let duplicated = library.duplicate(&[
            usage("Bark", "Leaf1"),
            usage("Leaf", "Leaf1"),
            usage("Bark", "Leaf2"),
        ]);

        assert!(duplicated.missing.is_empty());
        assert_eq!(
            duplicated.lines.concat(),
            "newmtl Leaf1\nNs 10.0\nKd 0.40 0.25 0.10\n\n\
             newmtl Leaf1\nKd 0.10 0.60 0.10\nmap_Kd leaf.png\n\
             newmtl Leaf2\nNs 10.0\nKd 0.40 0.25 0.10\n\n"
        );
    }

    #[test]
    fn test_duplicate_block_fidelity() {
        let library = MaterialLibrary::parse(TREE_MTL);
        let duplicated = library.duplicate(&[usage("Leaf", "Leaf7")]);

        let original = library.block("Leaf").unwrap();
        assert_eq!(duplicated.lines[0], "newmtl Leaf7\n");
        assert_eq!(&duplicated.lines[1..], &original[1..]);
    }

    #[test]
    fn test_duplicate_missing_material() {
        let library = MaterialLibrary::parse(TREE_MTL);
        let duplicated = library.duplicate(&[
            usage("Stone", "A"),
            usage("Leaf", "A"),
            usage("Stone", "B"),
        ]);

        assert_eq!(duplicated.missing, vec!["Stone".to_string()]);
        assert_eq!(duplicated.skipped, 2);
        assert_eq!(duplicated.lines[0], "newmtl A\n");
        assert_eq!(duplicated.lines.len(), 3);
    }

    #[test]
    fn test_duplicate_terminates_final_line() {
        let library = MaterialLibrary::parse("newmtl A\nKd 1 1 1");
        let duplicated = library.duplicate(&[usage("A", "X"), usage("A", "Y")]);

        assert_eq!(
            duplicated.lines.concat(),
            "newmtl X\nKd 1 1 1\nnewmtl Y\nKd 1 1 1\n"
        );
    }

    #[test]
    fn test_rewrite_scene_writes_files() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let input = src.path().join("tree.obj");
        std::fs::write(&input, LEAVES_OBJ).unwrap();
        std::fs::write(src.path().join("tree.mtl"), TREE_MTL).unwrap();

        let intermediate = work.path().join("temp.obj");
        let output = rewrite_scene(&input, &intermediate, NamingStrategy::PerObject).unwrap();

        assert_eq!(
            std::fs::read_to_string(&intermediate).unwrap(),
            output.scene.text()
        );
        let material_path = output.material_path.unwrap();
        assert_eq!(material_path, work.path().join("tree.mtl"));
        let mtl = std::fs::read_to_string(&material_path).unwrap();
        let declarations: Vec<&str> = mtl.lines().filter(|l| l.starts_with("newmtl")).collect();
        assert_eq!(declarations, ["newmtl Leaf1", "newmtl Leaf1", "newmtl Leaf2"]);
        assert_eq!(output.material_lines.concat(), mtl);

        // Source library untouched
        assert_eq!(
            std::fs::read_to_string(src.path().join("tree.mtl")).unwrap(),
            TREE_MTL
        );
    }

    #[test]
    fn test_rewrite_scene_missing_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("absent.obj");
        let err = rewrite_scene(&input, &dir.path().join("temp.obj"), NamingStrategy::PerObject)
            .unwrap_err();
        assert!(format!("{err:#}").contains("absent.obj"));
    }

    #[test]
    fn test_rewrite_scene_missing_library() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let input = src.path().join("tree.obj");
        std::fs::write(&input, LEAVES_OBJ).unwrap();

        let err = rewrite_scene(&input, &work.path().join("temp.obj"), NamingStrategy::PerObject)
            .unwrap_err();
        assert!(format!("{err:#}").contains("tree.mtl"));
    }

    #[test]
    fn test_rewrite_scene_refuses_to_overwrite_library() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("tree.obj");
        std::fs::write(&input, LEAVES_OBJ).unwrap();
        std::fs::write(dir.path().join("tree.mtl"), TREE_MTL).unwrap();

        let result = rewrite_scene(&input, &dir.path().join("temp.obj"), NamingStrategy::PerObject);

        assert!(result.is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("tree.mtl")).unwrap(),
            TREE_MTL
        );
    }

    #[test]
    fn test_rewrite_scene_usage_before_object_is_typed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.obj");
        std::fs::write(&input, "usemtl Bark\n").unwrap();

        let err = rewrite_scene(&input, &dir.path().join("temp.obj"), NamingStrategy::PerObject)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RewriteError>(),
            Some(RewriteError::UsageBeforeObject { line: 1, .. })
        ));
    }
}
