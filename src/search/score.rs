use serde::Serialize;

/// Display KPIs, in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub rental_yield: u8,
    pub growth_5y: u8,
    pub vacancy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalityScore {
    /// 60..=99
    pub score: u8,
    pub kpis: Kpis,
}

/// Source of investment scores for a locality.
pub trait ScoreProvider {
    fn score(&self, locality_name: &str) -> LocalityScore;
}

/// Placeholder provider: deterministic pseudo-scores derived from the locality name, so the
/// same suburb always shows the same numbers until real scoring is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashScoreProvider;

/// 32-bit polynomial hash (`h * 31 + unit`, wrapping) over the UTF-16 code units of `name`.
pub fn name_hash(name: &str) -> i32 {
    name.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    })
}

/// `|hash % modulus| + offset`; the remainder keeps the dividend's sign.
fn bucket(hash: i32, modulus: i32, offset: i32) -> u8 {
    ((hash % modulus).abs() + offset) as u8
}

impl ScoreProvider for HashScoreProvider {
    fn score(&self, locality_name: &str) -> LocalityScore {
        let h = name_hash(locality_name);
        LocalityScore {
            score: bucket(h, 40, 60),
            kpis: Kpis {
                rental_yield: bucket(h, 8, 2),
                growth_5y: bucket(h, 15, 5),
                vacancy: bucket(h, 5, 1),
            },
        }
    }
}
