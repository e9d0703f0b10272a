//! Small rendering helpers shared by the display code.

const LATIN: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

const GREEK: [&str; 24] = [
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau", "upsilon", "phi", "chi",
    "psi", "omega",
];

/// Renders a latin index id as a letter, cycling with a numeric suffix
/// beyond `z` (`0 -> "a"`, `26 -> "a1"`).
pub fn latin_name(id: u32) -> String {
    let letter = LATIN[(id % 26) as usize];
    let round = id / 26;
    if round == 0 {
        letter.to_string()
    } else {
        format!("{letter}{round}")
    }
}

/// Renders a greek index id in the `\alpha` escape form used by the parser.
pub fn greek_name(id: u32) -> String {
    let letter = GREEK[(id % 24) as usize];
    let round = id / 24;
    if round == 0 {
        format!("\\{letter}")
    } else {
        format!("\\{letter}{round}")
    }
}

/// Inverse of [`latin_name`] for a single letter.
pub fn latin_id(letter: char) -> Option<u32> {
    LATIN.iter().position(|&c| c == letter).map(|p| p as u32)
}

/// Inverse of [`greek_name`] for a bare greek word (no backslash).
pub fn greek_id(word: &str) -> Option<u32> {
    GREEK.iter().position(|&w| w == word).map(|p| p as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_round_trips() {
        assert_eq!(latin_name(0), "a");
        assert_eq!(latin_name(12), "m");
        assert_eq!(latin_name(26), "a1");
        assert_eq!(latin_id('m'), Some(12));
        assert_eq!(latin_id('M'), None);
    }

    #[test]
    fn greek_round_trips() {
        assert_eq!(greek_name(0), "\\alpha");
        assert_eq!(greek_name(11), "\\mu");
        assert_eq!(greek_id("mu"), Some(11));
        assert_eq!(greek_id("asdf"), None);
    }
}
