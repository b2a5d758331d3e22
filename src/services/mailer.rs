use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

/// Outcome of one dispatch attempt. The mailer never propagates errors;
/// callers log failures and keep going.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

/// Survey notification sink. When no API key is configured every send is
/// simulated and logged, which keeps local development working without
/// credentials.
pub struct Mailer {
    api_key: Option<String>,
    from_email: String,
    from_name: String,
    base_url: String,
    client: reqwest::Client,
}

impl Mailer {
    pub fn from_env() -> Self {
        let api_key = std::env::var("SENDGRID_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!("SENDGRID_API_KEY not configured, email sending will be simulated");
        }
        Self {
            api_key,
            from_email: std::env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@fullcircle.local".to_string()),
            from_name: std::env::var("FROM_NAME")
                .unwrap_or_else(|_| "FullCircle Feedback".to_string()),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            client: reqwest::Client::new(),
        }
    }

    pub fn respond_link(&self, response_token: &str) -> String {
        format!("{}/survey/respond/{}", self.base_url, response_token)
    }

    pub async fn send_survey_invitation(
        &self,
        run_id: Uuid,
        respondent_email: &str,
        respondent_name: &str,
        subject_name: &str,
        survey_title: &str,
        response_token: &str,
        due_date: DateTime<Utc>,
    ) -> SendOutcome {
        let link = self.respond_link(response_token);
        let due = due_date.format("%B %d, %Y").to_string();
        let subject = format!("Survey invitation: feedback for {subject_name}");
        let body = format!(
            "Hello {respondent_name},\n\n\
             You have been invited to provide feedback for {subject_name} as part \
             of a 360-degree feedback cycle.\n\n\
             Survey: {survey_title}\n\
             Due date: {due}\n\n\
             Complete the survey here:\n{link}\n\n\
             Thank you for your participation!"
        );

        let outcome = self.send(respondent_email, respondent_name, &subject, &body).await;
        if outcome.success {
            tracing::info!("Survey invitation sent to {respondent_email} for run {run_id}");
        } else {
            tracing::warn!(
                "Survey invitation to {respondent_email} for run {run_id} failed: {}",
                outcome.message
            );
        }
        outcome
    }

    pub async fn send_completion_confirmation(
        &self,
        respondent_email: &str,
        respondent_name: &str,
        subject_name: &str,
        survey_title: &str,
    ) -> SendOutcome {
        let subject = format!("Thank you for your feedback on {subject_name}");
        let body = format!(
            "Hello {respondent_name},\n\n\
             Thank you for completing the feedback survey for {subject_name}.\n\n\
             Survey: {survey_title}\n\n\
             Your feedback has been submitted and will contribute to \
             {subject_name}'s professional development."
        );

        let outcome = self.send(respondent_email, respondent_name, &subject, &body).await;
        if outcome.success {
            tracing::info!("Completion confirmation sent to {respondent_email}");
        } else {
            tracing::warn!(
                "Completion confirmation to {respondent_email} failed: {}",
                outcome.message
            );
        }
        outcome
    }

    async fn send(&self, to_email: &str, to_name: &str, subject: &str, text: &str) -> SendOutcome {
        let Some(api_key) = &self.api_key else {
            tracing::info!("SIMULATED EMAIL to {to_name} <{to_email}>: {subject}");
            return SendOutcome {
                success: true,
                message: "email simulated (mailer not configured)".to_string(),
            };
        };

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to_email, "name": to_name }] }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": text }],
        });

        let result = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => SendOutcome {
                success: true,
                message: "email sent".to_string(),
            },
            Ok(resp) => SendOutcome {
                success: false,
                message: format!("mail provider returned status {}", resp.status()),
            },
            Err(e) => SendOutcome {
                success: false,
                message: format!("mail dispatch failed: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer_with_base(base: &str) -> Mailer {
        Mailer {
            api_key: None,
            from_email: "noreply@example.com".to_string(),
            from_name: "FullCircle".to_string(),
            base_url: base.to_string(),
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn respond_link_embeds_token() {
        let mailer = mailer_with_base("https://surveys.example.com");
        assert_eq!(
            mailer.respond_link("abc123"),
            "https://surveys.example.com/survey/respond/abc123"
        );
    }

    #[tokio::test]
    async fn unconfigured_mailer_simulates_success() {
        let mailer = mailer_with_base("http://localhost:3000");
        let outcome = mailer
            .send_completion_confirmation("r@example.com", "Rita", "Sam", "Leadership 360")
            .await;
        assert!(outcome.success);
        assert!(outcome.message.contains("simulated"));
    }
}
