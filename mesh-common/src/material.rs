//! Materials and the MTL subset needed to carry them through a scene
//!
//! Attributes are kept as ordered `key value` statements so any MTL content
//! survives a load/export cycle without being interpreted.

use std::io::{self, Write};

/// Single MTL statement inside a material block (e.g. `Kd 0.1 0.5 0.1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialAttribute {
    pub key: String,
    pub value: String,
}

/// Surface material attached to a mesh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Material {
    /// Name written after `newmtl`
    pub name: String,
    /// Statements in file order
    pub attributes: Vec<MaterialAttribute>,
    /// Distinguishes otherwise identical materials during export
    pub uniqueness_tag: Option<u64>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Value of the first statement with `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Whether an exporter may write both materials as one block.
    ///
    /// Names are ignored: only attributes and the uniqueness tag count.
    pub fn is_equivalent(&self, other: &Material) -> bool {
        self.equivalence_key() == other.equivalence_key()
    }

    /// Hashable form of [`Material::is_equivalent`]
    pub fn equivalence_key(&self) -> (&[MaterialAttribute], Option<u64>) {
        (&self.attributes, self.uniqueness_tag)
    }

    fn write_block<W: Write>(&self, w: &mut W, name: &str) -> io::Result<()> {
        writeln!(w, "newmtl {}", name)?;
        for attr in &self.attributes {
            if attr.value.is_empty() {
                writeln!(w, "{}", attr.key)?;
            } else {
                writeln!(w, "{} {}", attr.key, attr.value)?;
            }
        }
        if let Some(tag) = self.uniqueness_tag {
            writeln!(w, "# uniqueness_tag {:016x}", tag)?;
        }
        Ok(())
    }
}

/// Parse MTL text into materials, in declaration order.
///
/// Statements before the first `newmtl` are ignored, as are comments and
/// blank lines.
pub fn parse_mtl(text: &str) -> Vec<Material> {
    let mut materials: Vec<Material> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (line, ""),
        };

        if key == "newmtl" {
            materials.push(Material::new(value));
            continue;
        }

        if let Some(current) = materials.last_mut() {
            current.attributes.push(MaterialAttribute {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    materials
}

/// Write material blocks, each under the given block name.
pub fn write_mtl<W: Write>(w: &mut W, blocks: &[(&str, &Material)]) -> io::Result<()> {
    for (i, (name, material)) in blocks.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        material.write_block(w, name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mtl_blocks() {
        let materials = parse_mtl(
            "# exported\nKd 9 9 9\nnewmtl Bark\nKd 0.4 0.2 0.1\nNs 10\n\nnewmtl Leaf\nKd 0.1 0.6 0.1\nmap_Kd leaf.png\n",
        );

        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "Bark");
        assert_eq!(materials[0].attribute("Kd"), Some("0.4 0.2 0.1"));
        assert_eq!(materials[0].attribute("Ns"), Some("10"));
        assert_eq!(materials[1].name, "Leaf");
        assert_eq!(materials[1].attribute("map_Kd"), Some("leaf.png"));
    }

    #[test]
    fn test_equivalence_ignores_name() {
        let mut a = Material::new("a");
        a.attributes.push(MaterialAttribute {
            key: "Kd".into(),
            value: "1 1 1".into(),
        });
        let mut b = a.clone();
        b.name = "b".into();
        assert!(a.is_equivalent(&b));

        b.uniqueness_tag = Some(7);
        assert!(!a.is_equivalent(&b));
    }

    #[test]
    fn test_write_mtl_with_tag() {
        let mut material = Material::new("ignored");
        material.attributes.push(MaterialAttribute {
            key: "Kd".into(),
            value: "0.5 0.5 0.5".into(),
        });
        material.uniqueness_tag = Some(0xabc);

        let mut out = Vec::new();
        write_mtl(&mut out, &[("Leaf1", &material)]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "newmtl Leaf1\nKd 0.5 0.5 0.5\n# uniqueness_tag 0000000000000abc\n"
        );
    }
}
