use crate::analyzer::AnalysisResult;
use crate::models::chat::ChatMessage;

pub const GREETING: &str =
    "안녕하세요? 저는 베이맥스. 당신의 개인 의료 도우미입니다. 현재 어떤 증상들이 있으신지 자세히 설명해 주시겠어요?";

pub const FALLBACK: &str =
    "죄송합니다. 말씀하신 증상을 정확히 이해하지 못했습니다. 증상을 조금 더 자세히 설명해 주시거나, 다른 표현으로 설명해 주시겠어요?";

pub const CLOSING: &str = "다른 도움이 필요하시면 언제든 말씀해 주세요!";

const LIST_SEPARATOR: &str = ", ";

/// Renders an analysis into the advisory bot message.
///
/// Zero matches produce [`FALLBACK`] verbatim. Otherwise one advisory block per
/// matched symptom, a combined block when more than one matched, then the
/// warnings and [`CLOSING`].
pub fn generate(result: &AnalysisResult<'_>) -> ChatMessage {
    ChatMessage::bot(render(result))
}

pub fn render(result: &AnalysisResult<'_>) -> String {
    if result.is_empty() {
        return FALLBACK.to_string();
    }

    let mut response = String::new();

    for matched in &result.matches {
        let entry = matched.entry;
        response.push_str(
            &format!(
                "{}때문에 불편하시군요. 지금부터 증상 완화를 위해 다음 절차를 따라주세요.\n",
                matched.name
            )
        );
        response.push_str(
            &format!("• 심각도: {}\n", entry.severity_advice.for_level(result.severity))
        );
        response.push_str(
            &format!("• 관련될 수 있는 증상: {}\n", entry.related_symptoms.join(LIST_SEPARATOR))
        );
        response.push_str(&format!("• 권장 조치: {}\n\n", entry.treatment));
    }

    if result.matches.len() > 1 {
        let categories = result.common_categories
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR);
        response.push_str("📊 종합 분석\n");
        response.push_str(&format!("• 증상 카테고리: {}\n", categories));
        response.push_str(
            &format!(
                "• 고려해볼 수 있는 상태: {}\n\n",
                result.related_conditions.join(LIST_SEPARATOR)
            )
        );
    }

    let warnings = result.matches
        .iter()
        .map(|m| m.entry.warning.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    response.push_str("⚠️ 주의사항\n");
    response.push_str(&warnings);
    response.push_str("\n\n");
    response.push_str(CLOSING);

    response
}
