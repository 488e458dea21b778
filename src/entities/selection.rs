//! The operator's drug list: one ordered sequence with text and quick-pick projections.

use crate::entities::input::split_drug_text;

pub const QUICK_PICK_DRUGS: &[&str] = &[
    "CODEINE",
    "WARFARIN",
    "CLOPIDOGREL",
    "SIMVASTATIN",
    "AZATHIOPRINE",
    "FLUOROURACIL",
];

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

pub fn is_quick_pick(name: &str) -> bool {
    QUICK_PICK_DRUGS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(name.trim()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrugSelection {
    names: Vec<String>,
}

impl DrugSelection {
    /// Parses comma-separated text. Quick-pick names are de-duplicated; repeated free-text
    /// names are kept since each comma segment is one requested drug.
    pub fn parse(text: &str) -> Self {
        Self::from_names(split_drug_text(text))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::default();
        for name in names {
            let name = normalize(name.as_ref());
            if name.is_empty() {
                continue;
            }
            if is_quick_pick(&name) && selection.contains(&name) {
                continue;
            }
            selection.names.push(name);
        }
        selection
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        self.names.iter().any(|n| *n == name)
    }

    /// Removes the name if present, else appends it upper-cased.
    pub fn toggle(&mut self, name: &str) {
        let name = normalize(name);
        if name.is_empty() {
            return;
        }
        if self.contains(&name) {
            self.names.retain(|n| *n != name);
        } else {
            self.names.push(name);
        }
    }

    pub fn to_text(&self) -> String {
        self.names.join(", ")
    }

    /// Quick-pick vocabulary paired with its selected flag.
    pub fn quick_picks(&self) -> Vec<(&'static str, bool)> {
        QUICK_PICK_DRUGS
            .iter()
            .map(|d| (*d, self.contains(d)))
            .collect()
    }
}

/// Toggles `name` in the drug text and returns the re-serialized text.
pub fn toggle(text: &str, name: &str) -> String {
    let mut selection = DrugSelection::parse(text);
    selection.toggle(name);
    selection.to_text()
}
