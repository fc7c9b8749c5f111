use crate::knowledge::{ Category, KnowledgeBase, Severity, SymptomEntry };
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedSymptom<'a> {
    pub name: &'a str,
    pub entry: &'a SymptomEntry,
}

/// Result of scanning one user submission. Built fresh per turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult<'a> {
    pub matches: Vec<MatchedSymptom<'a>>,
    pub severity: Severity,
    pub related_conditions: Vec<&'a str>,
    pub common_categories: Vec<Category>,
}

impl AnalysisResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            matched: self.matches
                .iter()
                .map(|m| m.name.to_string())
                .collect(),
            severity: self.severity,
            related_conditions: self.related_conditions
                .iter()
                .map(|c| c.to_string())
                .collect(),
            common_categories: self.common_categories.clone(),
        }
    }
}

/// Owned, serializable view of an [`AnalysisResult`] for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub matched: Vec<String>,
    pub severity: Severity,
    pub related_conditions: Vec<String>,
    pub common_categories: Vec<Category>,
}

/// Scans `input` against every knowledge-base entry.
///
/// Matching is literal substring containment with no normalization. Severity
/// is inferred once for the whole input and applies to every match.
pub fn analyze<'a>(knowledge: &'a KnowledgeBase, input: &str) -> AnalysisResult<'a> {
    let matches: Vec<MatchedSymptom<'a>> = knowledge
        .entries()
        .filter(|entry| entry.matches(input))
        .map(|entry| MatchedSymptom { name: entry.name.as_str(), entry })
        .collect();

    let severity = knowledge.intensifiers().infer(input);

    let mut related_conditions: Vec<&'a str> = Vec::new();
    let mut common_categories: Vec<Category> = Vec::new();
    for matched in &matches {
        for condition in &matched.entry.possible_conditions {
            if !related_conditions.contains(&condition.as_str()) {
                related_conditions.push(condition.as_str());
            }
        }
        for category in &matched.entry.categories {
            if !common_categories.contains(category) {
                common_categories.push(*category);
            }
        }
    }

    AnalysisResult {
        matches,
        severity,
        related_conditions,
        common_categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::builtin;
    use std::collections::HashSet;

    fn names<'a>(result: &AnalysisResult<'a>) -> Vec<&'a str> {
        result.matches
            .iter()
            .map(|m| m.name)
            .collect()
    }

    #[test]
    fn headache_and_fever_are_matched_in_table_order() {
        let result = analyze(builtin::knowledge_base(), "열이 나고 머리가 아프네요");
        assert_eq!(names(&result), vec!["두통", "발열"]);
        assert_eq!(result.severity, Severity::Mild);
    }

    #[test]
    fn every_keyword_matches_its_entry() {
        let kb = builtin::knowledge_base();
        for entry in kb.entries() {
            for keyword in &entry.keywords {
                let result = analyze(kb, &format!("요즘 {} 증상이 있어요", keyword));
                assert!(
                    names(&result).contains(&entry.name.as_str()),
                    "keyword '{}' did not match '{}'",
                    keyword,
                    entry.name
                );
            }
        }
    }

    #[test]
    fn no_keyword_yields_no_matches() {
        let result = analyze(builtin::knowledge_base(), "아무 문제 없어요");
        assert!(result.is_empty());
        assert!(result.related_conditions.is_empty());
        assert!(result.common_categories.is_empty());
    }

    #[test]
    fn empty_input_yields_no_matches() {
        let result = analyze(builtin::knowledge_base(), "");
        assert!(result.is_empty());
        assert_eq!(result.severity, Severity::Mild);
    }

    #[test]
    fn matching_is_spacing_sensitive() {
        // No space after 머리가, so the "머리가 아프" keyword must not fire.
        let result = analyze(builtin::knowledge_base(), "머리가아파요");
        assert!(result.is_empty());
    }

    #[test]
    fn severe_beats_moderate() {
        let result = analyze(builtin::knowledge_base(), "약간 기침이 나는데 매우 심해요");
        assert_eq!(result.severity, Severity::Severe);
    }

    #[test]
    fn moderate_intensifier() {
        let result = analyze(builtin::knowledge_base(), "조금 피곤해요");
        assert_eq!(names(&result), vec!["피로"]);
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[test]
    fn severe_headache() {
        let result = analyze(builtin::knowledge_base(), "매우 심한 두통");
        assert_eq!(names(&result), vec!["두통"]);
        assert_eq!(result.severity, Severity::Severe);
    }

    #[test]
    fn unions_have_no_duplicates_and_cover_all_matches() {
        let kb = builtin::knowledge_base();
        // 두통, 발열, 피로, 기침 share conditions (감기, 폐렴) and categories.
        let result = analyze(kb, "두통이랑 열, 피곤함, 기침까지 있어요");
        assert_eq!(names(&result), vec!["두통", "발열", "피로", "기침"]);

        let unique: HashSet<_> = result.related_conditions.iter().collect();
        assert_eq!(unique.len(), result.related_conditions.len());
        let unique: HashSet<_> = result.common_categories.iter().collect();
        assert_eq!(unique.len(), result.common_categories.len());

        for matched in &result.matches {
            for condition in &matched.entry.possible_conditions {
                assert!(result.related_conditions.contains(&condition.as_str()));
            }
            for category in &matched.entry.categories {
                assert!(result.common_categories.contains(category));
            }
        }
    }

    #[test]
    fn unions_keep_first_encountered_order() {
        let result = analyze(builtin::knowledge_base(), "두통과 복통");
        assert_eq!(
            result.common_categories,
            vec![Category::Neurological, Category::Pain, Category::Digestive]
        );
        assert_eq!(&result.related_conditions[..4], &[
            "긴장성 두통",
            "편두통",
            "군발성 두통",
            "부비동염",
        ]);
        assert_eq!(result.related_conditions[4], "소화불량");
    }

    #[test]
    fn analyze_is_idempotent() {
        let kb = builtin::knowledge_base();
        let input = "매우 어지럽고 배가 아파요";
        assert_eq!(analyze(kb, input), analyze(kb, input));
    }

    #[test]
    fn summary_is_owned_copy() {
        let result = analyze(builtin::knowledge_base(), "기침");
        let summary = result.summary();
        assert_eq!(summary.matched, vec!["기침".to_string()]);
        assert_eq!(summary.common_categories, vec![Category::Respiratory]);
        assert_eq!(summary.related_conditions.len(), 4);
    }
}
