pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You extract every piece of information from resumes into structured JSON. \
     Reply with a single JSON object and nothing else.";

pub const PREPROCESS_SYSTEM_PROMPT: &str =
    "You clean unstructured text extracted from documents into readable text \
     without changing, dropping or rephrasing any content.";

const EXTRACTION_INSTRUCTIONS: &str = r#"Extract all information from the resume text below into one JSON object.

Rules:
- The resume text is in Vietnamese. Do not translate or alter any of its content.
- Keep every value exactly as written. Do not translate, summarise or rephrase.
- Property names are English camelCase; resume content only ever appears as values.
- Leave out any field that has no data. Never emit null or empty strings.
- Keep bullet points, numbering and line breaks inside values.
- Content that fits nowhere else goes into "additionalInformation".

Use this structure as the base:
{
  "candidateInformation": {
    "fullName": "", "gender": "", "dateOfBirth": "", "IDNo": "", "currentPosition": "",
    "phone": [], "email": [], "address": "", "hometown": "", "introduce": ""
  },
  "education": [{"degree": "", "major": "", "university": "", "graduationDate": ""}],
  "trainingCourses": [{"course": "", "institution": ""}],
  "languageSkills": [],
  "computerSkills": [],
  "skills": {"technicalSkills": [], "softSkills": []},
  "workExperience": [{
    "company": "", "role": "", "scale": "", "duration": "", "salary": "",
    "reasonForLeaving": "", "responsibilities": []
  }],
  "projects": [],
  "achievementsAndAwards": [],
  "references": [],
  "salary": "",
  "expectedSalary": "",
  "reasonForApplication": [],
  "availability": "",
  "careerPlan": "",
  "familyInformation": [],
  "additionalInformation": {}
}

Resume text:
"#;

const PREPROCESS_INSTRUCTIONS: &str = r#"Clean up the text extracted from a resume without losing any content:
1. Keep every piece of information exactly as it appears.
2. Join sentences broken by stray line breaks; keep breaks between sections.
3. Remove redundant spaces and page headers, footers and page numbers.
4. Do not rephrase anything.

Text:
"#;

pub fn extraction_prompt(chunk: &str) -> String {
    format!("{EXTRACTION_INSTRUCTIONS}\"\"\"\n{chunk}\n\"\"\"\n")
}

pub fn preprocess_prompt(text: &str) -> String {
    format!("{PREPROCESS_INSTRUCTIONS}\"\"\"\n{text}\n\"\"\"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_is_embedded_verbatim() {
        let prompt = extraction_prompt("Nguyễn Văn A\n- Kế toán");
        assert!(prompt.starts_with(EXTRACTION_INSTRUCTIONS));
        assert!(prompt.contains("\"\"\"\nNguyễn Văn A\n- Kế toán\n\"\"\""));
    }

    #[test]
    fn extraction_schema_keeps_identity_and_application_fields() {
        let prompt = extraction_prompt("");
        for field in ["\"IDNo\"", "\n  \"salary\": \"\",\n  \"expectedSalary\"", "\"reasonForApplication\": []"] {
            assert!(prompt.contains(field), "missing {field}");
        }
        assert!(prompt.contains("The resume text is in Vietnamese. Do not translate"));
    }

    #[test]
    fn preprocess_prompt_wraps_text() {
        let prompt = preprocess_prompt("Page 1 of 2\nAlice");
        assert!(prompt.ends_with("\"\"\"\nPage 1 of 2\nAlice\n\"\"\"\n"));
    }
}
