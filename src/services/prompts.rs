use crate::dto::session_dto::CandidateProfile;
use crate::models::session::Scorecard;

pub const GREETING: &str = "Hello! 👋 I'm TalentScout, your AI hiring assistant. I'll collect a few details about you and then ask some technical questions about your stack. Could you please tell me your full name?";

pub const ROUND_COMPLETE: &str = "That completes this round of questions! 🎉 You can tell me about another technology for more questions, or say \"bye\" to finish.";

pub const UPSTREAM_APOLOGY: &str = "Sorry, I'm having trouble reaching the assistant right now. Please try sending your message again in a moment.";

pub const FALLBACK_RESPONSE: &str = "Sorry, I didn't understand that. Could you rephrase?";

pub const INVALID_SELECTION: &str = "Please choose one of the options A, B, C or D.";

pub const EMPTY_OPEN_ANSWER: &str = "Please write a short answer to the question.";

const SYSTEM_PROMPT: &str = r#"You are "TalentScout", an intelligent hiring assistant chatbot for a technology recruitment agency.

OBJECTIVES
1. Greet the candidate warmly and explain that you are an AI hiring assistant.
2. Collect the candidate's details, asking one question at a time:
   - Full Name
   - Email Address
   - Phone Number
   - Years of Experience
   - Desired Position(s)
   - Current Location
   - Tech Stack (programming languages, frameworks, databases, tools)
3. Ask the candidate to declare their tech stack clearly.
4. Once the tech stack is known, generate 3-5 multiple-choice technical questions for EACH declared technology.
5. Stay on topic. If the input is unclear, politely ask the candidate to rephrase.
6. If the candidate says "quit", "exit", "stop" or "bye", thank them and end the conversation.

OUTPUT RULES
- In conversation (greeting, collecting details, thanking) reply in natural, friendly prose.
- When generating questions, reply with STRICT JSON only, no commentary, using exactly this shape:
  [
    {
      "technology": "Python",
      "questions": [
        {
          "question": "Which keyword is used to define a function in Python?",
          "options": ["A) function", "B) def", "C) func", "D) lambda"],
          "correct_option": "B",
          "difficulty": "beginner"
        }
      ]
    }
  ]
- Every question has exactly 4 options labelled "A) " to "D) ".
- "correct_option" is a single uppercase letter: A, B, C or D. Vary its position across questions.
- "difficulty" is one of: beginner, intermediate, advanced.
- For a question that needs a written answer instead of a choice, leave out "options" and "correct_option" and give "answer_outline": a short summary of the key points a good answer covers.
- The application presents the questions and scores the answers itself. Never reveal correct answers in prose.
"#;

pub fn system_prompt(profile: Option<&CandidateProfile>) -> String {
    let Some(profile) = profile else {
        return SYSTEM_PROMPT.to_string();
    };

    let mut known = vec![format!("- Full Name: {}", profile.full_name.trim())];
    known.push(format!("- Email Address: {}", profile.email.trim()));
    if let Some(phone) = profile.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        known.push(format!("- Phone Number: {}", phone.trim()));
    }
    if let Some(years) = profile.years_of_experience {
        known.push(format!("- Years of Experience: {}", years));
    }
    if !profile.desired_positions.is_empty() {
        known.push(format!(
            "- Desired Position(s): {}",
            profile.desired_positions.join(", ")
        ));
    }
    if let Some(location) = profile.location.as_deref().filter(|l| !l.trim().is_empty()) {
        known.push(format!("- Current Location: {}", location.trim()));
    }
    if !profile.tech_stack.is_empty() {
        known.push(format!("- Tech Stack: {}", profile.tech_stack.join(", ")));
    }

    format!(
        "{}\nCANDIDATE DETAILS ALREADY PROVIDED (do not ask for these again)\n{}\n",
        SYSTEM_PROMPT,
        known.join("\n")
    )
}

pub fn closing_message(score: &Scorecard) -> String {
    if score.answered == 0 {
        return "Thank you for your time! Our recruitment team will review your details and get back to you soon. 👋".to_string();
    }
    format!(
        "Thank you for your time! You answered {} of {} questions correctly. Our recruitment team will review your responses and get back to you soon. 👋",
        score.correct, score.answered
    )
}
