use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_ROWS: usize = 6;
pub const DEFAULT_COLS: usize = 8;
pub const SEATS_PER_TABLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicRank {
    Good,
    Fair,
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    pub rank: AcademicRank,
    pub is_talkative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub row: usize,
    pub col: usize,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrangeError {
    CapacityExceeded { students: usize, capacity: usize },
    DuplicateStudent { id: String },
    InvalidGrid { rows: usize, cols: usize },
}

impl fmt::Display for ArrangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrangeError::CapacityExceeded { students, capacity } => {
                write!(f, "roster has {} students but the grid holds {}", students, capacity)
            }
            ArrangeError::DuplicateStudent { id } => {
                write!(f, "roster contains student id {} more than once", id)
            }
            ArrangeError::InvalidGrid { rows, cols } => {
                write!(f, "grid dimensions {}x{} are not usable", rows, cols)
            }
        }
    }
}

impl std::error::Error for ArrangeError {}

/// Soft constraints the greedy placement could not satisfy. Reported back to
/// the caller instead of failing: coverage is best-effort by design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UnmetConstraint {
    TableWithoutTopStudent { table: usize },
    GroupWithoutTopStudent { group: usize },
    TableWithoutGender { table: usize, gender: Gender },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrangement {
    pub seats: Vec<Seat>,
    pub unmet: Vec<UnmetConstraint>,
}

/// Static seat groupings derived once from the grid dimensions.
///
/// Tables are runs of up to four consecutive seats within a row (columns 0-3
/// form the left bank, 4-7 the right bank on the default grid). A column
/// count that is not a multiple of four leaves a short trailing table per
/// row rather than failing. Social groups are 2x2 blocks aligned on even
/// row/column boundaries; trailing odd rows or columns belong to no group.
#[derive(Debug, Clone)]
pub struct GridTopology {
    pub rows: usize,
    pub cols: usize,
    tables: Vec<Vec<usize>>,
    groups: Vec<Vec<usize>>,
}

impl GridTopology {
    pub fn new(rows: usize, cols: usize) -> Result<Self, ArrangeError> {
        if rows == 0 || cols == 0 {
            return Err(ArrangeError::InvalidGrid { rows, cols });
        }

        let mut tables = Vec::new();
        for r in 0..rows {
            let mut start = 0;
            while start < cols {
                let end = (start + SEATS_PER_TABLE).min(cols);
                tables.push((start..end).map(|c| r * cols + c).collect());
                start = end;
            }
        }

        let mut groups = Vec::new();
        let mut r = 0;
        while r + 1 < rows {
            let mut c = 0;
            while c + 1 < cols {
                let tl = r * cols + c;
                groups.push(vec![tl, tl + 1, tl + cols, tl + cols + 1]);
                c += 2;
            }
            r += 2;
        }

        Ok(Self {
            rows,
            cols,
            tables,
            groups,
        })
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    pub fn tables(&self) -> &[Vec<usize>] {
        &self.tables
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }
}

pub fn empty_grid(rows: usize, cols: usize) -> Vec<Seat> {
    (0..rows * cols)
        .map(|i| Seat {
            row: i / cols,
            col: i % cols,
            student_id: None,
        })
        .collect()
}

/// Runs `arrange` with a generator seeded from `seed`, so the same roster and
/// seed always reproduce the same chart.
pub fn arrange_seeded(
    roster: &[Student],
    rows: usize,
    cols: usize,
    seed: u64,
) -> Result<Arrangement, ArrangeError> {
    let mut rng = StdRng::seed_from_u64(seed);
    arrange(roster, rows, cols, &mut rng)
}

/// Greedy seat placement over the grid, in four ordered phases:
///
/// 1. shuffle the roster within rank categories, then seed one top (Good)
///    student into every 2x2 group, then every table, then anywhere;
/// 2. give each table missing a gender one student of that gender (empty
///    seats only, already-seated students are never moved);
/// 3. place talkative students one at a time into the empty seat farthest
///    from every talkative student already seated (ties broken at random);
/// 4. fill the remaining students front-to-back in row-major order.
///
/// No phase backtracks, so gender and top-student coverage may go unmet for
/// adversarial rosters; everything left unsatisfied is listed in the returned
/// `Arrangement::unmet`. Fails before placing anything if the roster exceeds
/// capacity or contains a duplicate id.
pub fn arrange<R: Rng>(
    roster: &[Student],
    rows: usize,
    cols: usize,
    rng: &mut R,
) -> Result<Arrangement, ArrangeError> {
    let topo = GridTopology::new(rows, cols)?;
    let capacity = topo.capacity();

    let mut seen: HashSet<&str> = HashSet::with_capacity(roster.len());
    for s in roster {
        if !seen.insert(s.id.as_str()) {
            return Err(ArrangeError::DuplicateStudent { id: s.id.clone() });
        }
    }
    if roster.len() > capacity {
        return Err(ArrangeError::CapacityExceeded {
            students: roster.len(),
            capacity,
        });
    }

    let mut occupants: Vec<Option<&Student>> = vec![None; capacity];

    let mut top: Vec<&Student> = roster
        .iter()
        .filter(|s| s.rank == AcademicRank::Good)
        .collect();
    let mut mid: Vec<&Student> = roster
        .iter()
        .filter(|s| s.rank == AcademicRank::Fair)
        .collect();
    let mut rest: Vec<&Student> = roster
        .iter()
        .filter(|s| s.rank != AcademicRank::Good && s.rank != AcademicRank::Fair)
        .collect();
    top.shuffle(rng);
    mid.shuffle(rng);
    rest.shuffle(rng);

    fn has_top(occupants: &[Option<&Student>], seats: &[usize]) -> bool {
        seats
            .iter()
            .any(|&i| matches!(occupants[i], Some(s) if s.rank == AcademicRank::Good))
    }

    // Top spread: groups first. Groups straddle two tables each, so covering
    // groups also covers most tables and spends fewer top students overall.
    let mut next_top = 0;
    for group in topo.groups() {
        if next_top >= top.len() {
            break;
        }
        if has_top(&occupants, group) {
            continue;
        }
        let empty: Vec<usize> = group
            .iter()
            .copied()
            .filter(|&i| occupants[i].is_none())
            .collect();
        if let Some(&slot) = empty.choose(rng) {
            occupants[slot] = Some(top[next_top]);
            next_top += 1;
        }
    }
    for table in topo.tables() {
        if next_top >= top.len() {
            break;
        }
        if has_top(&occupants, table) {
            continue;
        }
        let empty: Vec<usize> = table
            .iter()
            .copied()
            .filter(|&i| occupants[i].is_none())
            .collect();
        if let Some(&slot) = empty.choose(rng) {
            occupants[slot] = Some(top[next_top]);
            next_top += 1;
        }
    }
    while next_top < top.len() {
        let empty: Vec<usize> = (0..capacity).filter(|&i| occupants[i].is_none()).collect();
        let Some(&slot) = empty.choose(rng) else {
            break;
        };
        occupants[slot] = Some(top[next_top]);
        next_top += 1;
    }

    // Everyone not yet seated, fair students ahead of the rest.
    let mut unplaced: Vec<&Student> = mid;
    unplaced.append(&mut rest);

    // Gender balance: fill an empty seat in each table missing a gender. A
    // table already packed with one gender stays that way.
    for table in topo.tables() {
        for gender in [Gender::Male, Gender::Female] {
            let present = table
                .iter()
                .any(|&i| matches!(occupants[i], Some(s) if s.gender == gender));
            if present {
                continue;
            }
            let Some(&slot) = table.iter().find(|&&i| occupants[i].is_none()) else {
                continue;
            };
            let Some(pos) = unplaced.iter().position(|s| s.gender == gender) else {
                continue;
            };
            occupants[slot] = Some(unplaced.remove(pos));
        }
    }

    // Talkative separation: greedy max-min squared distance to every
    // talkative student already on the chart, whichever phase placed them.
    let mut i = 0;
    while i < unplaced.len() {
        if !unplaced[i].is_talkative {
            i += 1;
            continue;
        }
        let empty: Vec<usize> = (0..capacity).filter(|&j| occupants[j].is_none()).collect();
        if empty.is_empty() {
            break;
        }
        let talkers: Vec<(i64, i64)> = (0..capacity)
            .filter(|&j| matches!(occupants[j], Some(s) if s.is_talkative))
            .map(|j| ((j / cols) as i64, (j % cols) as i64))
            .collect();
        let slot = if talkers.is_empty() {
            empty[rng.gen_range(0..empty.len())]
        } else {
            let min_dist_sq = |j: usize| {
                let (r, c) = ((j / cols) as i64, (j % cols) as i64);
                talkers
                    .iter()
                    .map(|&(tr, tc)| (r - tr).pow(2) + (c - tc).pow(2))
                    .min()
                    .unwrap_or(i64::MAX)
            };
            let best = empty.iter().map(|&j| min_dist_sq(j)).max().unwrap_or(0);
            let ties: Vec<usize> = empty
                .iter()
                .copied()
                .filter(|&j| min_dist_sq(j) == best)
                .collect();
            ties[rng.gen_range(0..ties.len())]
        };
        occupants[slot] = Some(unplaced.remove(i));
    }

    // Remainder: first empty seat in row-major order.
    let empty: Vec<usize> = (0..capacity).filter(|&j| occupants[j].is_none()).collect();
    for (student, &slot) in unplaced.into_iter().zip(empty.iter()) {
        occupants[slot] = Some(student);
    }

    let mut unmet = Vec::new();
    for (t, table) in topo.tables().iter().enumerate() {
        let seated: Vec<&Student> = table.iter().filter_map(|&j| occupants[j]).collect();
        if seated.is_empty() {
            continue;
        }
        if !seated.iter().any(|s| s.rank == AcademicRank::Good) {
            unmet.push(UnmetConstraint::TableWithoutTopStudent { table: t });
        }
        if seated.len() >= 2 {
            for gender in [Gender::Male, Gender::Female] {
                if !seated.iter().any(|s| s.gender == gender) {
                    unmet.push(UnmetConstraint::TableWithoutGender { table: t, gender });
                }
            }
        }
    }
    for (g, group) in topo.groups().iter().enumerate() {
        let seated: Vec<&Student> = group.iter().filter_map(|&j| occupants[j]).collect();
        if seated.is_empty() {
            continue;
        }
        if !seated.iter().any(|s| s.rank == AcademicRank::Good) {
            unmet.push(UnmetConstraint::GroupWithoutTopStudent { group: g });
        }
    }

    let seats = occupants
        .iter()
        .enumerate()
        .map(|(j, occ)| Seat {
            row: j / cols,
            col: j % cols,
            student_id: occ.map(|s| s.id.clone()),
        })
        .collect();

    Ok(Arrangement { seats, unmet })
}
