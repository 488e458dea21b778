//! Display classification and per-result section expansion state.

use serde::Serialize;

use crate::entities::result::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskClass {
    Safe,
    Adjust,
    ToxicIneffective,
    Unknown,
}

impl RiskClass {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Self::Safe,
            "ADJUST DOSAGE" => Self::Adjust,
            "TOXIC" | "INEFFECTIVE" => Self::ToxicIneffective,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Adjust => "adjust",
            Self::ToxicIneffective => "toxic/ineffective",
            Self::Unknown => "unknown",
        }
    }
}

/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityEmphasis {
    Neutral,
    Mild,
    Medium,
    Strong,
    Critical,
}

impl SeverityEmphasis {
    pub fn from_severity(severity: &str) -> Self {
        match severity.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::Strong,
            "moderate" => Self::Medium,
            "low" => Self::Mild,
            _ => Self::Neutral,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Critical => "!!!",
            Self::Strong => "!!",
            Self::Medium => "!",
            Self::Mild => "~",
            Self::Neutral => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Profile,
    Recommendation,
    Explanation,
}

impl std::str::FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "recommendation" => Ok(Self::Recommendation),
            "explanation" => Ok(Self::Explanation),
            other => Err(format!(
                "unknown section '{other}' (expected profile, recommendation or explanation)"
            )),
        }
    }
}

/// Parses `<result number>:<section>`, e.g. `2:recommendation`. Result numbers are 1-based.
pub fn parse_section_toggle(value: &str) -> Result<(usize, Section), String> {
    let (number, section) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <result>:<section>, got '{value}'"))?;
    let number: usize = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid result number '{number}'"))?;
    if number == 0 {
        return Err("result numbers start at 1".into());
    }
    Ok((number - 1, section.parse()?))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionState {
    pub profile: bool,
    pub recommendation: bool,
    pub explanation: bool,
}

impl SectionState {
    pub fn default_for_index(index: usize) -> Self {
        Self {
            profile: index == 0,
            ..Self::default()
        }
    }

    pub fn expanded() -> Self {
        Self {
            profile: true,
            recommendation: true,
            explanation: true,
        }
    }

    pub fn is_expanded(&self, section: Section) -> bool {
        match section {
            Section::Profile => self.profile,
            Section::Recommendation => self.recommendation,
            Section::Explanation => self.explanation,
        }
    }

    pub fn toggle(&mut self, section: Section) {
        let flag = match section {
            Section::Profile => &mut self.profile,
            Section::Recommendation => &mut self.recommendation,
            Section::Explanation => &mut self.explanation,
        };
        *flag = !*flag;
    }
}

/// One result together with its derived display state.
#[derive(Debug, Clone)]
pub struct ResultView<'a> {
    pub result: &'a AnalysisResult,
    pub risk_class: RiskClass,
    pub emphasis: SeverityEmphasis,
    pub sections: SectionState,
}

impl<'a> ResultView<'a> {
    pub fn new(index: usize, result: &'a AnalysisResult) -> Self {
        Self {
            result,
            risk_class: RiskClass::from_label(&result.risk_assessment.risk_label),
            emphasis: SeverityEmphasis::from_severity(&result.risk_assessment.severity),
            sections: SectionState::default_for_index(index),
        }
    }
}

/// View state for a rendered result sequence.
#[derive(Debug, Clone)]
pub struct ResultsView<'a> {
    pub items: Vec<ResultView<'a>>,
}

impl<'a> ResultsView<'a> {
    pub fn new(results: &'a [AnalysisResult]) -> Self {
        Self {
            items: results
                .iter()
                .enumerate()
                .map(|(index, result)| ResultView::new(index, result))
                .collect(),
        }
    }

    /// Returns false when `index` is out of range.
    pub fn toggle(&mut self, index: usize, section: Section) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.sections.toggle(section);
                true
            }
            None => false,
        }
    }

    pub fn expand_all(&mut self) {
        for item in &mut self.items {
            item.sections = SectionState::expanded();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::result::fixtures::result;

    #[test]
    fn risk_class_mapping_is_case_insensitive() {
        assert_eq!(RiskClass::from_label("Safe"), RiskClass::Safe);
        assert_eq!(RiskClass::from_label("adjust dosage"), RiskClass::Adjust);
        assert_eq!(RiskClass::from_label("TOXIC"), RiskClass::ToxicIneffective);
        assert_eq!(RiskClass::from_label(" Ineffective "), RiskClass::ToxicIneffective);
        assert_eq!(RiskClass::from_label("Unknown"), RiskClass::Unknown);
        assert_eq!(RiskClass::from_label("Adjust"), RiskClass::Unknown);
        assert_eq!(RiskClass::ToxicIneffective.as_str(), "toxic/ineffective");
    }

    #[test]
    fn severity_emphasis_is_ordered() {
        let levels: Vec<SeverityEmphasis> = ["none", "LOW", "Moderate", "high", "CRITICAL", "extreme"]
            .into_iter()
            .map(SeverityEmphasis::from_severity)
            .collect();
        assert_eq!(
            levels,
            vec![
                SeverityEmphasis::Neutral,
                SeverityEmphasis::Mild,
                SeverityEmphasis::Medium,
                SeverityEmphasis::Strong,
                SeverityEmphasis::Critical,
                SeverityEmphasis::Neutral,
            ]
        );
        assert!(SeverityEmphasis::Critical > SeverityEmphasis::Strong);
    }

    #[test]
    fn first_result_has_profile_expanded_others_collapsed() {
        let results = vec![
            result("WARFARIN", "Toxic", "critical"),
            result("CODEINE", "Safe", "none"),
        ];
        let view = ResultsView::new(&results);
        let first = &view.items[0];
        assert_eq!(first.risk_class, RiskClass::ToxicIneffective);
        assert_eq!(first.emphasis, SeverityEmphasis::Critical);
        assert!(first.sections.is_expanded(Section::Profile));
        assert!(!first.sections.is_expanded(Section::Recommendation));
        assert_eq!(view.items[1].sections, SectionState::default());
    }

    #[test]
    fn toggling_is_independent_per_result_and_section() {
        let results = vec![
            result("WARFARIN", "Toxic", "critical"),
            result("CODEINE", "Safe", "none"),
        ];
        let mut view = ResultsView::new(&results);
        assert!(view.toggle(1, Section::Explanation));
        assert!(view.toggle(0, Section::Profile));
        assert!(!view.toggle(2, Section::Profile));

        assert_eq!(view.items[0].sections, SectionState::default());
        assert!(view.items[1].sections.explanation);
        assert!(!view.items[1].sections.profile);

        view.expand_all();
        assert!(view.items.iter().all(|i| i.sections == SectionState::expanded()));
    }

    #[test]
    fn section_toggle_argument_parses() {
        assert_eq!(
            parse_section_toggle("2:Recommendation"),
            Ok((1, Section::Recommendation))
        );
        assert_eq!(parse_section_toggle("1:profile"), Ok((0, Section::Profile)));
        assert!(parse_section_toggle("0:profile").is_err());
        assert!(parse_section_toggle("profile").is_err());
        assert!(parse_section_toggle("1:summary").is_err());
    }
}
