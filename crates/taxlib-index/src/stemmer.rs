//! Porter stemmer tuned for prefix matching of taxonomy labels.
//!
//! Differences from the classic algorithm:
//! - a terminal `y` is never rewritten to `i`;
//! - plurals in `ies` lose exactly those three letters (`companies` -> `compan`),
//!   so the stem still prefixes the singular form.
//!
//! Only lower-case ASCII words are stemmed; anything else is returned
//! lower-cased but otherwise untouched.

/// Stem a single word.
pub fn stem(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() <= 2 || !lower.bytes().all(|b| b.is_ascii_lowercase()) {
        return lower;
    }
    let mut stemmer = Stemmer { b: lower.into_bytes(), k: 0, j: 0 };
    stemmer.k = stemmer.b.len();
    stemmer.step1();
    if stemmer.k > 2 {
        stemmer.step3();
        stemmer.step4();
        stemmer.step5();
        stemmer.step6();
    }
    stemmer.b.truncate(stemmer.k);
    String::from_utf8(stemmer.b).unwrap_or_default()
}

/// Stem used in front of a trailing wildcard. When an `-ing` word stems to a
/// form two letters shorter ending in a restored `e` (`gaming` -> `game`), the
/// `e` is dropped so the prefix also covers the inflected forms.
pub fn prefix_stem(word: &str) -> String {
    let mut stemmed = stem(word);
    let lower = word.to_lowercase();
    if lower.ends_with("ing") && stemmed.len() + 2 == lower.len() && stemmed.ends_with('e') {
        stemmed.pop();
    }
    stemmed
}

/// Working buffer: `b[..k]` is the current word, `b[..j]` the stem matched by
/// the last successful `ends`.
struct Stemmer {
    b: Vec<u8>,
    k: usize,
    j: usize,
}

impl Stemmer {
    fn cons(&self, i: usize) -> bool {
        match self.b[i] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.cons(i - 1),
            _ => true,
        }
    }

    /// Number of vowel-consonant sequences in `b[..j]`.
    fn m(&self) -> usize {
        let mut n = 0;
        let mut i = 0;
        loop {
            if i >= self.j {
                return n;
            }
            if !self.cons(i) {
                break;
            }
            i += 1;
        }
        i += 1;
        loop {
            loop {
                if i >= self.j {
                    return n;
                }
                if self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
            n += 1;
            loop {
                if i >= self.j {
                    return n;
                }
                if !self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
        }
    }

    fn vowel_in_stem(&self) -> bool {
        (0..self.j).any(|i| !self.cons(i))
    }

    /// `b[i-1..=i]` is a double consonant.
    fn double_c(&self, i: usize) -> bool {
        i >= 1 && self.b[i] == self.b[i - 1] && self.cons(i)
    }

    /// `b[i-2..=i]` is consonant-vowel-consonant and the last is not w, x or y.
    fn cvc(&self, i: usize) -> bool {
        if i < 2 || !self.cons(i) || self.cons(i - 1) || !self.cons(i - 2) {
            return false;
        }
        !matches!(self.b[i], b'w' | b'x' | b'y')
    }

    fn ends(&mut self, suffix: &str) -> bool {
        let s = suffix.as_bytes();
        if s.len() > self.k || &self.b[self.k - s.len()..self.k] != s {
            return false;
        }
        self.j = self.k - s.len();
        true
    }

    fn set_to(&mut self, s: &str) {
        self.b.truncate(self.j);
        self.b.extend_from_slice(s.as_bytes());
        self.k = self.j + s.len();
    }

    fn r(&mut self, s: &str) {
        if self.m() > 0 {
            self.set_to(s);
        }
    }

    fn last(&self) -> u8 {
        self.b[self.k - 1]
    }

    fn penultimate(&self) -> u8 {
        if self.k >= 2 { self.b[self.k - 2] } else { 0 }
    }

    /// Plurals and `-ed` / `-ing`.
    fn step1(&mut self) {
        if self.last() == b's' {
            if self.ends("sses") {
                self.k -= 2;
            } else if self.ends("ies") {
                self.k = self.j;
            } else if self.penultimate() != b's' {
                self.k -= 1;
            }
        }
        if self.k < 3 {
            return;
        }
        if self.ends("eed") {
            if self.m() > 0 {
                self.k -= 1;
            }
        } else if (self.ends("ed") || self.ends("ing")) && self.vowel_in_stem() {
            self.k = self.j;
            if self.ends("at") {
                self.set_to("ate");
            } else if self.ends("bl") {
                self.set_to("ble");
            } else if self.ends("iz") {
                self.set_to("ize");
            } else if self.double_c(self.k - 1) {
                self.k -= 1;
                if matches!(self.last(), b'l' | b's' | b'z') {
                    self.k += 1;
                }
            } else {
                self.j = self.k;
                if self.m() == 1 && self.cvc(self.k - 1) {
                    self.set_to("e");
                }
            }
        }
    }

    /// Double suffixes to single ones (`-ization` -> `-ize`).
    fn step3(&mut self) {
        if self.k < 2 {
            return;
        }
        let rules: &[(&str, &str)] = match self.penultimate() {
            b'a' => &[("ational", "ate"), ("tional", "tion")],
            b'c' => &[("enci", "ence"), ("anci", "ance")],
            b'e' => &[("izer", "ize")],
            b'l' => &[("bli", "ble"), ("alli", "al"), ("entli", "ent"), ("eli", "e"), ("ousli", "ous")],
            b'o' => &[("ization", "ize"), ("ation", "ate"), ("ator", "ate")],
            b's' => &[("alism", "al"), ("iveness", "ive"), ("fulness", "ful"), ("ousness", "ous")],
            b't' => &[("aliti", "al"), ("iviti", "ive"), ("biliti", "ble")],
            b'g' => &[("logi", "log")],
            _ => &[],
        };
        self.replace_first(rules);
    }

    /// `-ic-`, `-full`, `-ness` and friends.
    fn step4(&mut self) {
        let rules: &[(&str, &str)] = match self.last() {
            b'e' => &[("icate", "ic"), ("ative", ""), ("alize", "al")],
            b'i' => &[("iciti", "ic")],
            b'l' => &[("ical", "ic"), ("ful", "")],
            b's' => &[("ness", "")],
            _ => &[],
        };
        self.replace_first(rules);
    }

    fn replace_first(&mut self, rules: &[(&str, &str)]) {
        for (suffix, replacement) in rules {
            if self.ends(suffix) {
                self.r(replacement);
                return;
            }
        }
    }

    /// Drops `-ant`, `-ence` etc. when the remaining stem is long enough.
    fn step5(&mut self) {
        if self.k < 2 {
            return;
        }
        let suffixes: &[&str] = match self.penultimate() {
            b'a' => &["al"],
            b'c' => &["ance", "ence"],
            b'e' => &["er"],
            b'i' => &["ic"],
            b'l' => &["able", "ible"],
            b'n' => &["ant", "ement", "ment", "ent"],
            b'o' => {
                if self.ends("ion") && self.j > 0 && matches!(self.b[self.j - 1], b's' | b't') {
                    return self.drop_stem_if_long();
                }
                &["ou"]
            }
            b's' => &["ism"],
            b't' => &["ate", "iti"],
            b'u' => &["ous"],
            b'v' => &["ive"],
            b'z' => &["ize"],
            _ => &[],
        };
        if suffixes.iter().any(|s| self.ends(s)) {
            self.drop_stem_if_long();
        }
    }

    fn drop_stem_if_long(&mut self) {
        if self.m() > 1 {
            self.k = self.j;
        }
    }

    /// Final `-e` and `-ll`.
    fn step6(&mut self) {
        self.j = self.k;
        if self.last() == b'e' {
            let m = self.m();
            if m > 1 || (m == 1 && !(self.k >= 2 && self.cvc(self.k - 2))) {
                self.k -= 1;
            }
        }
        if self.last() == b'l' && self.double_c(self.k - 1) && self.m() > 1 {
            self.k -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plurals() {
        assert_eq!(stem("Revenues"), "revenu");
        assert_eq!(stem("revenue"), "revenu");
        assert_eq!(stem("caresses"), "caress");
        assert_eq!(stem("cats"), "cat");
        assert_eq!(stem("glass"), "glass");
    }

    #[test]
    fn ies_is_trimmed_by_three() {
        assert_eq!(stem("Companies"), "compan");
        assert_eq!(stem("liabilities"), "liabilit");
        assert!("company".starts_with(&stem("companies")));
    }

    #[test]
    fn terminal_y_is_kept() {
        assert_eq!(stem("happy"), "happy");
        assert_eq!(stem("company"), "company");
    }

    #[test]
    fn ed_and_ing() {
        assert_eq!(stem("Gaming"), "game");
        assert_eq!(stem("hopping"), "hop");
        assert_eq!(stem("filing"), "file");
        assert_eq!(stem("conflated"), "conflat");
        assert_eq!(stem("agreed"), "agre");
    }

    #[test]
    fn prefix_stem_drops_restored_e() {
        assert_eq!(prefix_stem("gaming"), "gam");
        assert!("game".starts_with(&prefix_stem("gaming")));
        assert_eq!(prefix_stem("hopping"), "hop");
        assert_eq!(prefix_stem("revenues"), "revenu");
        assert_eq!(prefix_stem("game"), "game");
    }

    #[test]
    fn derivational_suffixes() {
        assert_eq!(stem("relational"), "relat");
        assert_eq!(stem("hopefulness"), "hope");
        assert_eq!(stem("operating"), "oper");
        assert_eq!(stem("income"), "incom");
    }

    #[test]
    fn short_and_non_ascii_words_pass_through() {
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("Umsätze"), "umsätze");
        assert_eq!(stem("10k"), "10k");
    }
}
