//! Prompt templates shared by every backend. Only transport shape differs
//! per provider; the instructions the model sees are identical.

use crate::ai::types::{CertificationType, GenericExamType};

pub const SYSTEM_PROMPT: &str = "You are an expert software engineer. Generate clean, optimal \
code solutions. Always respond with valid JSON in the exact format requested.";

const JSON_ONLY: &str = "Important: Return ONLY the JSON, no markdown code blocks or additional text.";

pub fn solution_prompt(problem: &str, language: &str) -> String {
    format!(
        r#"Solve this coding problem in {language}:

{problem}

Provide your response in JSON format:
{{
  "code": "complete solution code",
  "explanation": "brief explanation of the approach",
  "timeComplexity": "O(...)",
  "spaceComplexity": "O(...)"
}}

{JSON_ONLY}"#
    )
}

pub fn image_analysis_prompt(language: &str) -> String {
    format!(
        r#"Analyze this coding challenge screenshot and provide a complete solution in {language}.

Extract the problem description from the image and solve it.

Provide your response in JSON format:
{{
  "code": "complete solution code",
  "explanation": "brief explanation of the problem and approach",
  "timeComplexity": "O(...)",
  "spaceComplexity": "O(...)"
}}

{JSON_ONLY}"#
    )
}

pub fn certification_prompt(certification: CertificationType) -> String {
    let exam = certification.display_name();
    format!(
        r#"You are an expert AWS certification instructor helping a student prepare for the {exam} exam.

Analyze this certification exam screenshot and provide detailed answers for ALL questions visible in the image.

CRITICAL INSTRUCTIONS:
1. DETECT the language of the questions (English, Portuguese, Spanish, etc.) and RESPOND IN THE SAME LANGUAGE
2. Answer ALL questions visible in the screenshot - there may be one or multiple questions
3. For EACH question:
   - Identify the correct answer(s)
   - Explain why the correct answer is right
   - Explain why each incorrect answer is wrong
   - List related AWS services
4. Provide general exam tips at the end

Provide your response in JSON format:
{{
  "answers": [
    {{
      "questionNumber": 1,
      "questionSummary": "Brief summary of what the question asks",
      "correctAnswer": "The letter(s) and full text of the correct answer(s), e.g., 'B. Amazon S3'",
      "explanation": "Detailed explanation of why this is the correct answer",
      "incorrectAnswersExplanation": "Explanation of why each incorrect option is wrong",
      "relatedServices": ["List", "of", "AWS", "services", "mentioned"]
    }}
  ],
  "examTips": "General tips for answering similar questions on the exam"
}}

If there are multiple questions, add more objects to the "answers" array with incrementing questionNumber.

Important:
- Return ONLY the JSON, no markdown code blocks or additional text.
- RESPOND IN THE SAME LANGUAGE AS THE QUESTIONS IN THE IMAGE."#
    )
}

pub fn generic_exam_prompt(exam_type: GenericExamType, extra_context: Option<&str>) -> String {
    let exam = exam_type.display_name();
    let context_block = match extra_context {
        Some(context) if !context.trim().is_empty() => {
            format!("\nAdditional context from the student: {context}\n")
        }
        _ => String::new(),
    };

    format!(
        r#"You are an expert exam tutor helping a student with a {exam} exam.
{context_block}
Analyze this exam screenshot and provide detailed answers for ALL questions visible in the image.

CRITICAL INSTRUCTIONS:
1. DETECT the language of the questions and RESPOND IN THE SAME LANGUAGE
2. Answer ALL questions visible in the screenshot - there may be one or multiple questions
3. For EACH question:
   - Identify the correct answer(s)
   - Explain why the correct answer is right
   - Explain why each incorrect answer is wrong
   - Name the subject and the specific topic the question belongs to
4. Provide general study tips at the end

Provide your response in JSON format:
{{
  "answers": [
    {{
      "questionNumber": 1,
      "questionSummary": "Brief summary of what the question asks",
      "correctAnswer": "The letter(s) and full text of the correct answer(s)",
      "explanation": "Detailed explanation of why this is the correct answer",
      "incorrectAnswersExplanation": "Explanation of why each incorrect option is wrong",
      "subject": "The subject area, e.g. 'Mathematics'",
      "topic": "The specific topic, e.g. 'Quadratic equations'"
    }}
  ],
  "studyTips": "General tips for studying this kind of question",
  "detectedLanguage": "The language the questions are written in"
}}

If there are multiple questions, add more objects to the "answers" array with incrementing questionNumber.

Important:
- Return ONLY the JSON, no markdown code blocks or additional text.
- RESPOND IN THE SAME LANGUAGE AS THE QUESTIONS IN THE IMAGE."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_prompt_embeds_problem_and_language() {
        let prompt = solution_prompt("reverse a linked list", "Rust");
        assert!(prompt.contains("reverse a linked list"));
        assert!(prompt.contains("in Rust"));
        assert!(prompt.contains("Return ONLY the JSON"));
    }

    #[test]
    fn certification_prompt_names_the_exam_and_demands_source_language() {
        let prompt = certification_prompt(CertificationType::AwsCloudPractitioner);
        assert!(prompt.contains("AWS Cloud Practitioner"));
        assert!(prompt.contains("RESPOND IN THE SAME LANGUAGE"));
        assert!(prompt.contains("\"examTips\""));
    }

    #[test]
    fn generic_exam_prompt_includes_extra_context_only_when_present() {
        let with = generic_exam_prompt(GenericExamType::Enem, Some("focus on question 12"));
        assert!(with.contains("focus on question 12"));

        let without = generic_exam_prompt(GenericExamType::Enem, None);
        assert!(!without.contains("Additional context"));

        let blank = generic_exam_prompt(GenericExamType::Enem, Some("   "));
        assert!(!blank.contains("Additional context"));
    }
}
