//! Deterministic agent names.
//!
//! Agents are named Aaron through Zane in creation order. A swarm larger
//! than the table wraps around with a lap suffix: `Aaron-2`, `Betty-2`, ...

/// Base names in order (Aaron through Zane).
pub const NAMES: [&str; 26] = [
    "Aaron", "Betty", "Carlos", "Diana", "Ethan", "Fiona", "George", "Hannah",
    "Ian", "Julia", "Kevin", "Laura", "Miguel", "Nadia", "Omar", "Priya",
    "Quinn", "Rosa", "Sam", "Tina", "Uma", "Victor", "Wendy", "Xavier",
    "Yara", "Zane",
];

/// Name of the agent created at `index`.
///
/// # Examples
/// ```
/// use beamswarm::agent::names::name_for;
/// assert_eq!(name_for(0), "Aaron");
/// assert_eq!(name_for(25), "Zane");
/// assert_eq!(name_for(27), "Betty-2");
/// ```
pub fn name_for(index: usize) -> String {
    let base = NAMES[index % NAMES.len()];
    match index / NAMES.len() {
        0 => base.to_string(),
        lap => format!("{}-{}", base, lap + 1),
    }
}

/// Names for a swarm of `count` agents.
pub fn get_names(count: usize) -> Vec<String> {
    (0..count).map(name_for).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lap() {
        assert_eq!(name_for(0), "Aaron");
        assert_eq!(name_for(1), "Betty");
        assert_eq!(name_for(25), "Zane");
    }

    #[test]
    fn test_wraps_with_suffix() {
        assert_eq!(name_for(26), "Aaron-2");
        assert_eq!(name_for(53), "Betty-3");
    }

    #[test]
    fn test_get_names() {
        assert_eq!(get_names(3), vec!["Aaron", "Betty", "Carlos"]);
        assert!(get_names(0).is_empty());
        assert_eq!(get_names(30).len(), 30);
    }

    #[test]
    fn test_all_names_unique() {
        let mut seen = std::collections::HashSet::new();
        for name in get_names(80) {
            assert!(seen.insert(name.clone()), "Duplicate name: {}", name);
        }
    }
}
