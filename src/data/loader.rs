use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::model::{Atom, Dataset, InfoValue, Structure};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load atomic structures from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xyz` / `.extxyz` – (extended) XYZ, any number of frames
/// * `.json`            – `[{ "symbols": [...], "positions": [[x, y, z], ...], ...info }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "xyz" | "extxyz" => {
            let text = std::fs::read_to_string(path).context("reading XYZ file")?;
            parse_xyz(&text)?
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading JSON file")?;
            parse_json(&text)?
        }
        other => bail!("Unsupported file extension: .{other}"),
    };

    log::info!(
        "loaded {} structures ({} atoms, elements {:?}) from {}",
        dataset.len(),
        dataset.n_atoms(),
        dataset.symbols,
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Extended XYZ
// ---------------------------------------------------------------------------

/// Frame layout:
///
/// ```text
/// 3
/// Lattice="10 0 0 0 10 0 0 0 10" pbc="T T T" energy=-14.2 Properties=species:S:1:pos:R:3
/// O  0.000  0.000  0.000
/// H  0.757  0.586  0.000
/// H -0.757  0.586  0.000
/// ```
///
/// Plain XYZ (free-text comment line) is accepted as well; the comment is then
/// stored as `info["comment"]`.
pub fn parse_xyz(text: &str) -> Result<Dataset> {
    let lines: Vec<&str> = text.lines().collect();
    let mut structures = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        let header = lines[cursor].trim();
        if header.is_empty() {
            cursor += 1;
            continue;
        }
        let frame = structures.len();
        let n_atoms: usize = header.parse().with_context(|| {
            format!("Frame {frame}, line {}: '{header}' is not an atom count", cursor + 1)
        })?;
        let comment = lines
            .get(cursor + 1)
            .with_context(|| format!("Frame {frame}: missing comment line"))?;

        let first_atom_line = cursor + 2;
        let end = match first_atom_line.checked_add(n_atoms) {
            Some(end) if end <= lines.len() => end,
            _ => bail!(
                "Frame {frame}: header at line {} announces {n_atoms} atoms but only {} lines follow",
                cursor + 1,
                lines.len().saturating_sub(first_atom_line)
            ),
        };

        let mut structure = parse_comment_line(comment)
            .with_context(|| format!("Frame {frame}, line {}", cursor + 2))?;
        let columns = atom_columns(&structure.info)
            .with_context(|| format!("Frame {frame}: invalid Properties"))?;

        for (offset, line) in lines[first_atom_line..end]
            .iter()
            .enumerate()
        {
            let line_no = first_atom_line + offset + 1;
            let atom = parse_atom_line(line, &columns)
                .with_context(|| format!("Frame {frame}, line {line_no}"))?;
            structure.atoms.push(atom);
        }
        structure.info.remove("Properties");

        structures.push(structure);
        cursor = end;
    }

    Ok(Dataset::from_structures(structures))
}

/// Column offsets of the species and the first position component.
struct AtomColumns {
    species: usize,
    pos: usize,
}

fn atom_columns(info: &BTreeMap<String, InfoValue>) -> Result<AtomColumns> {
    let spec = match info.get("Properties") {
        Some(InfoValue::String(s)) => s.clone(),
        _ => return Ok(AtomColumns { species: 0, pos: 1 }),
    };
    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() % 3 != 0 {
        bail!("'{spec}' is not a list of name:type:count triplets");
    }

    let mut species = None;
    let mut pos = None;
    let mut column = 0;
    for triplet in fields.chunks(3) {
        let count: usize = triplet[2]
            .parse()
            .with_context(|| format!("column count '{}' is not an integer", triplet[2]))?;
        match triplet[0] {
            "species" => species = Some(column),
            "pos" => pos = Some(column),
            _ => {}
        }
        column += count;
    }

    Ok(AtomColumns {
        species: species.context("Properties lacks a 'species' column")?,
        pos: pos.context("Properties lacks a 'pos' column")?,
    })
}

fn parse_atom_line(line: &str, columns: &AtomColumns) -> Result<Atom> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let symbol = tokens
        .get(columns.species)
        .with_context(|| format!("missing species column in '{line}'"))?;

    let mut position = [0.0; 3];
    for (k, slot) in position.iter_mut().enumerate() {
        let tok = tokens
            .get(columns.pos + k)
            .with_context(|| format!("missing coordinate {k} in '{line}'"))?;
        *slot = tok
            .parse::<f64>()
            .with_context(|| format!("'{tok}' is not a number"))?;
    }

    Ok(Atom::new(*symbol, position))
}

/// Parse `key=value` pairs (values optionally double-quoted) into a structure
/// carrying cell, periodicity and info.
fn parse_comment_line(comment: &str) -> Result<Structure> {
    let pairs = split_key_values(comment);
    let mut structure = Structure::default();

    if pairs.is_empty() || !comment.contains('=') {
        let text = comment.trim();
        if !text.is_empty() {
            structure
                .info
                .insert("comment".to_string(), InfoValue::String(text.to_string()));
        }
        return Ok(structure);
    }

    let mut pbc_given = false;
    for (key, value) in pairs {
        match key.as_str() {
            "Lattice" => {
                let v = parse_floats(&value).context("parsing Lattice")?;
                if v.len() != 9 {
                    bail!("Lattice needs 9 numbers, got {}", v.len());
                }
                structure.cell = Some([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]]);
            }
            "pbc" => {
                let flags: Vec<&str> = value.split_whitespace().collect();
                if flags.len() != 3 {
                    bail!("pbc needs 3 flags, got '{value}'");
                }
                for (slot, flag) in structure.pbc.iter_mut().zip(flags) {
                    *slot = match flag {
                        "T" | "True" | "true" | "1" => true,
                        "F" | "False" | "false" | "0" => false,
                        other => bail!("'{other}' is not a periodicity flag"),
                    };
                }
                pbc_given = true;
            }
            "Properties" => {
                structure.info.insert(key, InfoValue::String(value));
            }
            _ => {
                structure.info.insert(key, InfoValue::guess(&value));
            }
        }
    }

    if structure.cell.is_some() && !pbc_given {
        structure.pbc = [true; 3];
    }
    Ok(structure)
}

fn split_key_values(line: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = line.trim().chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() == Some(&'=') {
            chars.next();
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    value.push(c);
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
            pairs.push((key, value));
        } else {
            // bare flag
            pairs.push((key, "T".to_string()));
        }
    }

    pairs
}

fn parse_floats(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .with_context(|| format!("'{tok}' is not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Records-oriented JSON:
///
/// ```json
/// [
///   {
///     "symbols": ["O", "H", "H"],
///     "positions": [[0.0, 0.0, 0.0], [0.757, 0.586, 0.0], [-0.757, 0.586, 0.0]],
///     "cell": [[10, 0, 0], [0, 10, 0], [0, 0, 10]],
///     "pbc": [true, true, true],
///     "energy": -14.2
///   }
/// ]
/// ```
pub fn parse_json(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut structures = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Record {i} is not a JSON object"))?;

        let symbols = obj
            .get("symbols")
            .and_then(|v| v.as_array())
            .with_context(|| format!("Record {i}: missing or invalid 'symbols' array"))?;
        let positions = obj
            .get("positions")
            .and_then(|v| v.as_array())
            .with_context(|| format!("Record {i}: missing or invalid 'positions' array"))?;
        if symbols.len() != positions.len() {
            bail!(
                "Record {i}: {} symbols but {} positions",
                symbols.len(),
                positions.len()
            );
        }

        let mut structure = Structure::default();
        for (j, (sym, pos)) in symbols.iter().zip(positions).enumerate() {
            let symbol = sym
                .as_str()
                .with_context(|| format!("Record {i}, symbols[{j}]: not a string"))?;
            let position = json_vec3(pos).with_context(|| format!("Record {i}, positions[{j}]"))?;
            structure.atoms.push(Atom::new(symbol, position));
        }

        if let Some(cell) = obj.get("cell").filter(|v| !v.is_null()) {
            let rows = cell
                .as_array()
                .filter(|rows| rows.len() == 3)
                .with_context(|| format!("Record {i}: 'cell' must be a 3x3 array"))?;
            let mut m = [[0.0; 3]; 3];
            for (r, row) in rows.iter().enumerate() {
                m[r] = json_vec3(row).with_context(|| format!("Record {i}, cell[{r}]"))?;
            }
            structure.cell = Some(m);
            structure.pbc = [true; 3];
        }

        if let Some(pbc) = obj.get("pbc").filter(|v| !v.is_null()) {
            structure.pbc = match pbc {
                JsonValue::Bool(b) => [*b; 3],
                JsonValue::Array(flags) if flags.len() == 3 => {
                    let mut out = [false; 3];
                    for (slot, flag) in out.iter_mut().zip(flags) {
                        *slot = flag
                            .as_bool()
                            .with_context(|| format!("Record {i}: 'pbc' entries must be booleans"))?;
                    }
                    out
                }
                _ => bail!("Record {i}: 'pbc' must be a boolean or three booleans"),
            };
        }

        for (key, val) in obj {
            if matches!(key.as_str(), "symbols" | "positions" | "cell" | "pbc") {
                continue;
            }
            structure.info.insert(key.clone(), json_to_info(val));
        }

        structures.push(structure);
    }

    Ok(Dataset::from_structures(structures))
}

fn json_vec3(val: &JsonValue) -> Result<[f64; 3]> {
    let arr = val
        .as_array()
        .filter(|a| a.len() == 3)
        .context("expected an array of three numbers")?;
    let mut out = [0.0; 3];
    for (k, (slot, v)) in out.iter_mut().zip(arr).enumerate() {
        *slot = v
            .as_f64()
            .with_context(|| format!("component {k} is not a number"))?;
    }
    Ok(out)
}

fn json_to_info(val: &JsonValue) -> InfoValue {
    match val {
        JsonValue::String(s) => InfoValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                InfoValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                InfoValue::Float(f)
            } else {
                InfoValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => InfoValue::Bool(*b),
        JsonValue::Null => InfoValue::Null,
        other => InfoValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Render structures as extended XYZ (inverse of [`parse_xyz`]).
pub fn to_xyz_string(structures: &[Structure]) -> String {
    let mut out = String::new();
    for s in structures {
        out.push_str(&format!("{}\n", s.len()));

        let mut fields = Vec::new();
        if let Some(cell) = &s.cell {
            let flat: Vec<String> = cell.iter().flatten().map(|v| format!("{v}")).collect();
            fields.push(format!("Lattice=\"{}\"", flat.join(" ")));
        }
        let flags: Vec<&str> = s.pbc.iter().map(|&p| if p { "T" } else { "F" }).collect();
        fields.push(format!("pbc=\"{}\"", flags.join(" ")));
        for (key, value) in &s.info {
            match value {
                InfoValue::String(text) if text.contains(char::is_whitespace) => {
                    fields.push(format!("{key}=\"{text}\""))
                }
                InfoValue::Null => {}
                other => fields.push(format!("{key}={other}")),
            }
        }
        fields.push("Properties=species:S:1:pos:R:3".to_string());
        out.push_str(&fields.join(" "));
        out.push('\n');

        for atom in &s.atoms {
            let [x, y, z] = atom.position;
            out.push_str(&format!("{:<2} {x:>14.8} {y:>14.8} {z:>14.8}\n", atom.symbol));
        }
    }
    out
}
