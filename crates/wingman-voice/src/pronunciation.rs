//! Text normalization applied to every utterance before synthesis.
//!
//! Turkish voices mispronounce English programming vocabulary and read
//! symbols literally, so Turkish text gets a respelling table plus a few
//! math rewrites. Every language gets digit `+` digit spelled out, and a
//! Turkish sum such as `2 + 7 = 9` is read as "2 artı 7, toplam 9 eder".
//!
//! [`normalize`] is idempotent: no respelling produces a word that is itself
//! in the table, and every rewrite removes the symbol it matched.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// English technical terms and their Turkish phonetic respelling.
const TURKISH_TERMS: &[(&str, &str)] = &[
    // programming
    ("array", "erey"),
    ("target", "targıt"),
    ("sum", "sam"),
    ("return", "ritörn"),
    ("function", "fankşın"),
    ("variable", "veriebıl"),
    ("string", "sıtring"),
    ("integer", "intıcır"),
    ("boolean", "bulien"),
    ("null", "nal"),
    ("undefined", "andifaynd"),
    ("object", "obcekt"),
    ("class", "klas"),
    ("method", "metod"),
    ("property", "propırti"),
    ("value", "velyu"),
    ("key", "ki"),
    ("index", "indeks"),
    ("element", "elımınt"),
    ("node", "nod"),
    ("tree", "tri"),
    ("graph", "graf"),
    ("hash", "heş"),
    ("map", "mep"),
    ("queue", "kyu"),
    ("stack", "stek"),
    ("heap", "hip"),
    ("search", "sörç"),
    ("binary", "baynıri"),
    ("merge", "mörc"),
    ("quick", "kvik"),
    ("bubble", "babıl"),
    ("insertion", "insörşın"),
    ("selection", "silekşın"),
    // algorithms
    ("complexity", "kompleksiti"),
    ("time", "taym"),
    ("space", "speys"),
    ("input", "inpat"),
    ("output", "autput"),
    ("edge", "ec"),
    ("case", "keys"),
    ("worst", "vörst"),
    ("average", "evırıc"),
    ("optimal", "optimıl"),
    ("solution", "söluşın"),
    ("approach", "ıproç"),
    ("algorithm", "algoritm"),
    ("recursion", "rikörjın"),
    ("iteration", "itereyşın"),
    ("loop", "lup"),
    ("condition", "kındişın"),
    ("statement", "steytmınt"),
    ("expression", "ikspireşın"),
    ("operator", "opereytor"),
    // data structures
    ("linked", "linkd"),
    ("doubly", "dablı"),
    ("circular", "sörkyulır"),
    ("balanced", "belınsd"),
    ("binary search tree", "baynıri sörç tri"),
    ("avl", "ey vi el"),
    ("red-black", "red blek"),
    // problem vocabulary
    ("two sum", "tu sam"),
    ("three sum", "tri sam"),
    ("palindrome", "pelindrom"),
    ("anagram", "enegram"),
    ("substring", "sabstring"),
    ("subarray", "saberey"),
    ("subsequence", "sabsikvıns"),
    ("permutation", "pörmyuteyşın"),
    ("combination", "kombıneyşın"),
    ("valid", "velid"),
    ("invalid", "invelid"),
    ("parentheses", "perentisiz"),
    ("bracket", "brekıt"),
    ("brace", "breys"),
    // testing
    ("pass", "pas"),
    ("fail", "feyl"),
    ("error", "erör"),
    ("exception", "iksepşın"),
    ("debug", "dibag"),
    ("breakpoint", "breykpoynt"),
    ("console", "konsol"),
    // abbreviations
    ("api", "ey pi ay"),
    ("url", "yu ar el"),
    ("json", "cey son"),
    ("xml", "eks em el"),
    ("html", "eyç ti em el"),
    ("css", "si es es"),
    ("sql", "es kyu el"),
    ("crud", "krad"),
    ("mvc", "em vi si"),
    ("oop", "o o pi"),
    ("dry", "dray"),
    ("kiss", "kis"),
    // frameworks
    ("react", "riekt"),
    ("vue", "vyu"),
    ("angular", "engyulır"),
    ("express", "ikspres"),
    ("django", "cengo"),
    ("spring", "sıpring"),
    ("rails", "reylz"),
    // everyday tech words
    ("click", "klik"),
    ("drag", "dreg"),
    ("push", "puş"),
    ("shift", "şift"),
    ("unshift", "anşift"),
    ("splice", "sıplayş"),
    ("slice", "sılays"),
    ("split", "sıplit"),
    ("join", "coyn"),
    ("filter", "filtır"),
    ("reduce", "ridyus"),
    ("find", "faynd"),
    ("includes", "inkluds"),
    ("indexof", "indeks of"),
    ("charat", "ker et"),
    ("tolowercase", "tu lovır keys"),
    ("touppercase", "tu apır keys"),
];

struct Rules {
    plus: Regex,
    sum_total: Regex,
    big_o: Regex,
    power: Regex,
    terms: Regex,
    lookup: HashMap<&'static str, &'static str>,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut terms: Vec<&str> = TURKISH_TERMS.iter().map(|(term, _)| *term).collect();
        terms.sort_by_key(|term| std::cmp::Reverse(term.len()));
        let alternation = terms
            .iter()
            .map(|term| regex::escape(term))
            .collect::<Vec<_>>()
            .join("|");

        Rules {
            plus: compile(r"(\d+)\s*\+\s*(\d+)"),
            sum_total: compile(r"(\d+(?:\s+artı\s+\d+)+)\s*=\s*(\d+)"),
            big_o: compile(r"\bO\(([^()]+)\)"),
            power: compile(r"\bn\^([23])\b"),
            terms: compile(&format!(r"(?i)\b(?:{alternation})\b")),
            lookup: TURKISH_TERMS.iter().copied().collect(),
        }
    })
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hardcoded normalization pattern")
}

/// Normalizes `text` for speech in `language` (a code such as `tr` or `en-US`).
pub fn normalize(text: &str, language: &str) -> String {
    let rules = rules();
    let turkish = primary_subtag(language) == "tr";

    let mut out = spell_plus(rules, text, if turkish { "artı" } else { "plus" });
    if turkish {
        out = rules
            .sum_total
            .replace_all(&out, "$1, toplam $2 eder")
            .into_owned();
        out = repeat_until_settled(&rules.big_o, out, "o $1");
        out = rules
            .power
            .replace_all(&out, |caps: &Captures| {
                if &caps[1] == "2" {
                    "n kare"
                } else {
                    "n küp"
                }
            })
            .into_owned();
        out = respell_terms(rules, &out);
    }
    out
}

fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn spell_plus(rules: &Rules, text: &str, word: &str) -> String {
    // Chains like 1+2+3 overlap, so one pass leaves operators behind.
    repeat_until_settled(&rules.plus, text.to_string(), &format!("$1 {word} $2"))
}

/// Applies `pattern` until it no longer matches. Every rewrite removes the
/// symbol it matched, so this terminates.
fn repeat_until_settled(pattern: &Regex, mut text: String, replacement: &str) -> String {
    while pattern.is_match(&text) {
        text = pattern.replace_all(&text, replacement).into_owned();
    }
    text
}

fn respell_terms(rules: &Rules, text: &str) -> String {
    rules
        .terms
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            let Some(spoken) = rules.lookup.get(matched.to_lowercase().as_str()) else {
                return matched.to_string();
            };
            if matched.chars().next().is_some_and(char::is_uppercase) {
                capitalize(spoken)
            } else {
                (*spoken).to_string()
            }
        })
        .into_owned()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turkish_math_is_spoken() {
        assert_eq!(normalize("3 + 4", "tr"), "3 artı 4");
        assert_eq!(normalize("1+2+3", "tr"), "1 artı 2 artı 3");
        assert_eq!(normalize("Bu O(n^2) olur", "tr"), "Bu o n kare olur");
        assert_eq!(normalize("O(n^3)", "tr"), "o n küp");
    }

    #[test]
    fn turkish_sums_state_the_total() {
        assert_eq!(normalize("2 + 7 = 9", "tr"), "2 artı 7, toplam 9 eder");
        assert_eq!(
            normalize("Yani 1+2+3=6 olur", "tr"),
            "Yani 1 artı 2 artı 3, toplam 6 eder olur"
        );
        assert_eq!(normalize("2 + 7 = 9", "en"), "2 plus 7 = 9");
    }

    #[test]
    fn plus_is_only_spoken_between_digits() {
        assert_eq!(normalize("a + b", "tr"), "a + b");
        assert_eq!(normalize("i+1", "en"), "i+1");
    }

    #[test]
    fn nested_big_o_is_fully_rewritten() {
        assert_eq!(normalize("O(O(n))", "tr"), "o o n");
        assert_eq!(normalize("O(n * O(m))", "tr"), "o n * o m");
    }

    #[test]
    fn english_only_spells_plus() {
        assert_eq!(normalize("2+2 is four", "en"), "2 plus 2 is four");
        assert_eq!(normalize("O(n^2) array", "en-US"), "O(n^2) array");
    }

    #[test]
    fn terms_are_respelled_with_case_preserved() {
        assert_eq!(normalize("Array ve hash map", "tr"), "Erey ve heş mep");
        assert_eq!(normalize("binary search tree kur", "tr"), "baynıri sörç tri kur");
        assert_eq!(normalize("API çağrısı", "tr-TR"), "Ey pi ay çağrısı");
    }

    #[test]
    fn terms_match_whole_words_only() {
        assert_eq!(normalize("summary", "tr"), "summary");
        assert_eq!(normalize("mapping", "tr"), "mapping");
    }

    #[test]
    fn respellings_are_not_table_terms() {
        for (term, spoken) in TURKISH_TERMS {
            assert_eq!(
                normalize(spoken, "tr"),
                *spoken,
                "respelling of '{term}' is rewritten again"
            );
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Two Sum için 2 + 7 = 9, zaman O(n^2) değil O(n).",
            "Queue ve stack farkı nedir? 10+20+30",
            "Use a hash map: O(n) time, 1 + 1.",
            "O(O(n)) ve O(n * O(log n))",
            "3 + 4 = 7 ve 2+2=4",
        ];
        for language in ["tr", "en"] {
            for sample in samples {
                let once = normalize(sample, language);
                assert_eq!(normalize(&once, language), once, "{language}: {sample}");
            }
        }
    }
}
