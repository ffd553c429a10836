use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

pub struct EmailService;

impl EmailService {
    /// Fire-and-forget result notification after a final assessment is
    /// scored. Delivery failure never fails the submission.
    pub async fn send_result_email(
        email: &str,
        name: &str,
        course_title: &str,
        final_mark: f64,
        grade: &str,
    ) -> bool {
        match Self::try_send_result(email, name, course_title, final_mark, grade).await {
            Ok(_) => {
                info!("Result email sent successfully to {}", email);
                true
            }
            Err(e) => {
                error!("Failed to send result email to {}: {}", email, e);
                false
            }
        }
    }

    async fn try_send_result(
        email: &str,
        name: &str,
        course_title: &str,
        final_mark: f64,
        grade: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mail_user = crate::config::Config::mail_user();
        let mail_password = crate::config::Config::mail_password();

        if mail_user.is_empty() || mail_password.is_empty() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err("Email not configured".into());
        }

        let display_name = if name.is_empty() { "there" } else { name };

        let from_mailbox: Mailbox = crate::config::Config::mail_from().parse()?;
        let to_mailbox: Mailbox = email.parse()?;

        let email_body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <head>
                <style>
                    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
                    .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
                    .header {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
                              color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
                    .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
                    .grade-box {{ background: white; border: 2px dashed #667eea; border-radius: 8px;
                               padding: 20px; text-align: center; margin: 20px 0; }}
                    .grade {{ font-size: 48px; font-weight: bold; color: #667eea; }}
                    .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
                </style>
            </head>
            <body>
                <div class="container">
                    <div class="header">
                        <h1>🎓 EduVerse</h1>
                        <p>Your assessment result is in</p>
                    </div>
                    <div class="content">
                        <p>Hi {},</p>
                        <p>Your final assessment for <strong>{}</strong> has been graded.</p>

                        <div class="grade-box">
                            <p style="margin: 0; color: #666;">Final mark: {:.2} / 100</p>
                            <div class="grade">{}</div>
                        </div>

                        <p>You can review the full breakdown on your dashboard.</p>

                        <p>Best regards,<br><strong>The EduVerse Team</strong></p>
                    </div>
                    <div class="footer">
                        <p>© 2026 EduVerse. All rights reserved.</p>
                    </div>
                </div>
            </body>
            </html>
            "#,
            display_name, course_title, final_mark, grade
        );

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(format!("Your {} result", course_title))
            .header(ContentType::TEXT_HTML)
            .body(email_body)?;

        let creds = Credentials::new(mail_user, mail_password);
        let mailer = SmtpTransport::relay(&crate::config::Config::mail_host())?
            .credentials(creds)
            .build();

        mailer.send(&email_message)?;
        Ok(())
    }
}
