//! Diagnostic run state machine.
//!
//! Five fixed stages run in order; `Done` and `Failed` are terminal and
//! absorb further advances.

/// Stage of a diagnostic run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisState {
    ContextAssessment,
    RoiVerification,
    DiseaseIdentification,
    TrendAnalysis,
    TreatmentPlanning,
    Done,
    Failed,
}

impl DiagnosisState {
    pub fn first() -> Self {
        DiagnosisState::ContextAssessment
    }

    /// Next state in the fixed stage order; terminal states return
    /// themselves.
    pub fn advance(self) -> Self {
        match self {
            DiagnosisState::ContextAssessment => DiagnosisState::RoiVerification,
            DiagnosisState::RoiVerification => DiagnosisState::DiseaseIdentification,
            DiagnosisState::DiseaseIdentification => DiagnosisState::TrendAnalysis,
            DiagnosisState::TrendAnalysis => DiagnosisState::TreatmentPlanning,
            DiagnosisState::TreatmentPlanning => DiagnosisState::Done,
            DiagnosisState::Done => DiagnosisState::Done,
            DiagnosisState::Failed => DiagnosisState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DiagnosisState::Done | DiagnosisState::Failed)
    }

    /// 1-based stage number, `None` for terminal states
    pub fn stage_number(self) -> Option<u8> {
        match self {
            DiagnosisState::ContextAssessment => Some(1),
            DiagnosisState::RoiVerification => Some(2),
            DiagnosisState::DiseaseIdentification => Some(3),
            DiagnosisState::TrendAnalysis => Some(4),
            DiagnosisState::TreatmentPlanning => Some(5),
            DiagnosisState::Done | DiagnosisState::Failed => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DiagnosisState::ContextAssessment => "作物与环境概述",
            DiagnosisState::RoiVerification => "病斑区域核查",
            DiagnosisState::DiseaseIdentification => "病害类型识别",
            DiagnosisState::TrendAnalysis => "发展趋势分析",
            DiagnosisState::TreatmentPlanning => "风险评估与防治建议",
            DiagnosisState::Done => "完成",
            DiagnosisState::Failed => "失败",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut state = DiagnosisState::first();
        let mut numbers = Vec::new();
        while let Some(n) = state.stage_number() {
            numbers.push(n);
            state = state.advance();
        }
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(state, DiagnosisState::Done);
    }

    #[test]
    fn test_terminal_states_absorb() {
        assert_eq!(DiagnosisState::Done.advance(), DiagnosisState::Done);
        assert_eq!(DiagnosisState::Failed.advance(), DiagnosisState::Failed);
        assert!(DiagnosisState::Done.is_terminal());
        assert!(DiagnosisState::Failed.is_terminal());
        assert!(!DiagnosisState::TrendAnalysis.is_terminal());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            DiagnosisState::ContextAssessment.display_name(),
            "作物与环境概述"
        );
        assert_eq!(
            DiagnosisState::TreatmentPlanning.display_name(),
            "风险评估与防治建议"
        );
    }
}
