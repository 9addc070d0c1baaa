//! Cutoff-based neighbour search, periodic images included.

use crate::error::{Error, Result};

use super::model::Structure;

/// Closest approach (Å) accepted between two atoms or images.
const MIN_SEPARATION: f64 = 1e-8;

/// One neighbour of a central atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the neighbouring atom in the structure.
    pub index: usize,
    /// Vector from the central atom to this (possibly translated) neighbour.
    pub displacement: [f64; 3],
    pub distance: f64,
}

/// For every atom, all neighbours strictly closer than `cutoff`.
/// Coincident atoms are rejected since angles to them are undefined.
///
/// Periodic directions are handled by enumerating every lattice translation
/// that can bring an image within the cutoff, so cells smaller than the cutoff
/// are supported and an atom may see several images of the same neighbour
/// (including of itself).
pub fn neighbor_list(structure: &Structure, cutoff: f64) -> Result<Vec<Vec<Neighbor>>> {
    if !(cutoff.is_finite() && cutoff > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "cutoff must be positive, got {cutoff}"
        )));
    }

    let shifts = image_shifts(structure, cutoff)?;
    let cutoff_sq = cutoff * cutoff;
    let atoms = &structure.atoms;

    let mut list = vec![Vec::new(); atoms.len()];
    for (i, center) in atoms.iter().enumerate() {
        for (j, other) in atoms.iter().enumerate() {
            for (shift_idx, shift) in shifts.iter().enumerate() {
                // shift 0 is always the identity translation
                if i == j && shift_idx == 0 {
                    continue;
                }
                let d = [
                    other.position[0] + shift[0] - center.position[0],
                    other.position[1] + shift[1] - center.position[1],
                    other.position[2] + shift[2] - center.position[2],
                ];
                let r_sq = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
                if r_sq < MIN_SEPARATION * MIN_SEPARATION {
                    return Err(Error::InvalidParameter(format!(
                        "atoms {i} ({}) and {j} ({}) overlap",
                        center.symbol, other.symbol
                    )));
                }
                if r_sq < cutoff_sq {
                    list[i].push(Neighbor {
                        index: j,
                        displacement: d,
                        distance: r_sq.sqrt(),
                    });
                }
            }
        }
    }
    Ok(list)
}

/// Cartesian lattice translations to test, identity first.
fn image_shifts(structure: &Structure, cutoff: f64) -> Result<Vec<[f64; 3]>> {
    let mut shifts = vec![[0.0; 3]];
    if !structure.is_periodic() {
        return Ok(shifts);
    }

    let cell = structure.cell.ok_or_else(|| {
        Error::InvalidParameter("periodic structure without a cell".to_string())
    })?;
    let volume = dot(&cell[0], &cross(&cell[1], &cell[2])).abs();
    if volume < 1e-12 {
        return Err(Error::InvalidParameter(
            "periodic structure has a degenerate cell".to_string(),
        ));
    }

    // Number of repeats along a_i: cutoff over the spacing of the lattice
    // planes spanned by the two other vectors.
    let mut reps = [0i64; 3];
    for axis in 0..3 {
        if !structure.pbc[axis] {
            continue;
        }
        let b = &cell[(axis + 1) % 3];
        let c = &cell[(axis + 2) % 3];
        let area = norm(&cross(b, c));
        let height = volume / area;
        reps[axis] = (cutoff / height).ceil() as i64;
    }

    for n0 in -reps[0]..=reps[0] {
        for n1 in -reps[1]..=reps[1] {
            for n2 in -reps[2]..=reps[2] {
                if n0 == 0 && n1 == 0 && n2 == 0 {
                    continue;
                }
                let mut t = [0.0; 3];
                for k in 0..3 {
                    t[k] = n0 as f64 * cell[0][k] + n1 as f64 * cell[1][k] + n2 as f64 * cell[2][k];
                }
                shifts.push(t);
            }
        }
    }
    Ok(shifts)
}

pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Atom;

    fn dimer(r: f64) -> Structure {
        Structure::molecule(vec![
            Atom::new("H", [0.0, 0.0, 0.0]),
            Atom::new("H", [r, 0.0, 0.0]),
        ])
    }

    #[test]
    fn finds_pair_inside_cutoff() {
        let list = neighbor_list(&dimer(1.0), 2.0).unwrap();
        assert_eq!(list[0].len(), 1);
        assert_eq!(list[0][0].index, 1);
        assert_eq!(list[0][0].displacement, [1.0, 0.0, 0.0]);
        assert_eq!(list[1][0].displacement, [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn cutoff_is_exclusive() {
        let list = neighbor_list(&dimer(2.0), 2.0).unwrap();
        assert!(list.iter().all(Vec::is_empty));
    }

    #[test]
    fn single_atom_in_small_box_sees_its_images() {
        let mut s = Structure::molecule(vec![Atom::new("Ar", [0.0; 3])]);
        s.cell = Some([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]);
        s.pbc = [true; 3];
        let list = neighbor_list(&s, 2.5).unwrap();
        // 6 face images at 2.0; edge images at 2.83 are outside
        assert_eq!(list[0].len(), 6);
        assert!(list[0].iter().all(|n| n.index == 0 && (n.distance - 2.0).abs() < 1e-12));
    }

    #[test]
    fn partial_periodicity_only_replicates_periodic_axes() {
        let mut s = Structure::molecule(vec![Atom::new("Ar", [0.0; 3])]);
        s.cell = Some([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]);
        s.pbc = [true, false, false];
        let list = neighbor_list(&s, 2.5).unwrap();
        assert_eq!(list[0].len(), 2);
    }

    #[test]
    fn periodic_without_cell_is_an_error() {
        let mut s = dimer(1.0);
        s.pbc = [true; 3];
        assert!(neighbor_list(&s, 2.0).is_err());
    }

    #[test]
    fn non_positive_cutoff_is_an_error() {
        assert!(neighbor_list(&dimer(1.0), 0.0).is_err());
        assert!(neighbor_list(&dimer(1.0), f64::NAN).is_err());
    }

    #[test]
    fn coincident_atoms_are_rejected() {
        let s = Structure::molecule(vec![
            Atom::new("H", [0.5, 0.5, 0.5]),
            Atom::new("O", [0.0, 0.0, 0.0]),
            Atom::new("H", [0.5, 0.5, 0.5]),
        ]);
        let err = neighbor_list(&s, 3.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(ref m) if m.contains("overlap")), "{err}");
    }
}
