use serde::{Deserialize, Serialize};

use crate::ai::extract::flexible_string;
use crate::db::CaptureKind;

/// Certification exams the analysis prompt knows how to coach for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificationType {
    AwsCloudPractitioner,
    AwsSolutionsArchitectAssociate,
    AwsDeveloperAssociate,
    AwsSysOpsAdministrator,
    AwsSolutionsArchitectProfessional,
    AwsDevOpsEngineerProfessional,
}

impl CertificationType {
    pub fn display_name(&self) -> &'static str {
        match self {
            CertificationType::AwsCloudPractitioner => "AWS Cloud Practitioner",
            CertificationType::AwsSolutionsArchitectAssociate => {
                "AWS Solutions Architect Associate"
            }
            CertificationType::AwsDeveloperAssociate => "AWS Developer Associate",
            CertificationType::AwsSysOpsAdministrator => "AWS SysOps Administrator",
            CertificationType::AwsSolutionsArchitectProfessional => {
                "AWS Solutions Architect Professional"
            }
            CertificationType::AwsDevOpsEngineerProfessional => {
                "AWS DevOps Engineer Professional"
            }
        }
    }

    pub fn all() -> &'static [CertificationType] {
        &[
            CertificationType::AwsCloudPractitioner,
            CertificationType::AwsSolutionsArchitectAssociate,
            CertificationType::AwsDeveloperAssociate,
            CertificationType::AwsSysOpsAdministrator,
            CertificationType::AwsSolutionsArchitectProfessional,
            CertificationType::AwsDevOpsEngineerProfessional,
        ]
    }
}

/// Exam families for the generic exam path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenericExamType {
    Enem,
    Vestibular,
    Concurso,
    Oab,
    Enade,
    Outros,
}

impl GenericExamType {
    pub fn display_name(&self) -> &'static str {
        match self {
            GenericExamType::Enem => "ENEM",
            GenericExamType::Vestibular => "Vestibular",
            GenericExamType::Concurso => "Concurso Publico",
            GenericExamType::Oab => "OAB",
            GenericExamType::Enade => "ENADE",
            GenericExamType::Outros => "Outros",
        }
    }
}

/// What the captured image should be analyzed as. Decides the prompt, the
/// expected result shape, and the history record's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptContext {
    CodeChallenge {
        language: String,
    },
    Certification(CertificationType),
    GenericExam {
        exam_type: GenericExamType,
        extra_context: Option<String>,
    },
}

impl PromptContext {
    pub fn kind(&self) -> CaptureKind {
        match self {
            PromptContext::CodeChallenge { .. } => CaptureKind::CodeChallenge,
            PromptContext::Certification(_) => CaptureKind::Certification,
            PromptContext::GenericExam { .. } => CaptureKind::GenericExam,
        }
    }

    /// Free-text history metadata, e.g. the selected exam subtype.
    pub fn metadata(&self) -> Option<String> {
        match self {
            PromptContext::CodeChallenge { language } => Some(language.clone()),
            PromptContext::Certification(cert) => Some(cert.display_name().to_string()),
            PromptContext::GenericExam { exam_type, .. } => {
                Some(exam_type.display_name().to_string())
            }
        }
    }
}

/// Solution for a coding challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionResult {
    pub code: String,
    pub explanation: String,
    pub time_complexity: String,
    pub space_complexity: String,
}

/// One answered certification question. `question_number` is whatever the
/// model produced; duplicates or gaps are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationAnswer {
    pub question_number: u32,
    pub question_summary: String,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(deserialize_with = "flexible_string")]
    pub incorrect_answers_explanation: String,
    pub related_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationResult {
    pub answers: Vec<CertificationAnswer>,
    pub exam_tips: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericExamAnswer {
    pub question_number: u32,
    pub question_summary: String,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(deserialize_with = "flexible_string")]
    pub incorrect_answers_explanation: String,
    pub subject: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericExamResult {
    pub answers: Vec<GenericExamAnswer>,
    pub study_tips: String,
    #[serde(default = "default_language")]
    pub detected_language: String,
}

fn default_language() -> String {
    "Unknown".to_string()
}

/// Union of the three result shapes an image analysis can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisResult {
    Solution(SolutionResult),
    Certification(CertificationResult),
    GenericExam(GenericExamResult),
}
