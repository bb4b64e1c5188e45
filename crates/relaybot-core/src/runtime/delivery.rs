//! Verified image delivery.
//!
//! Drives generate → post → verify → (retry | finalize) for one image reply.
//! Each step consumes the current [`DeliveryState`] and returns the next one;
//! the per-attempt record is rebuilt rather than mutated between steps.
//!
//! ```text
//! Generating ──ok──▶ Posting ──ok──▶ Verifying ──Match──────────────▶ Finalizing ─▶ Done
//!     │                 │               │  └─Mismatch/Indeterminate─┐
//!     │fail             │fail           │    attempt < max          ▼
//!     ▼                 ▼               │                      Generating (n+1)
//!   Done /           Done (aborted)     └─attempt == max──▶ Finalizing (note) ─▶ Done
//!   Finalizing (apology)
//! ```

use std::sync::Arc;

use base64::Engine;
use relaybot_ai::{CompletionGateway, CompletionRequest, ContinuationToken, ImageSynthesizer};
use tracing::{debug, error, info, warn};

use crate::channel::{ChatDelivery, MessageHandle, OutboundMessage};

/// Default total number of image attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Shown on a replacement image while it is being checked.
pub const REPLACING_SUFFIX: &str = "\n*(The last image missed the mark, here is a replacement...)*";
/// Appended when a replacement image could not be generated.
pub const REPLACEMENT_FAILED_SUFFIX: &str =
    "\n*(Sorry, I tried to make a closer match but the replacement failed.)*";
/// Appended when every attempt was judged a mismatch.
pub const BEST_EFFORT_NOTE: &str = "\n*(This is my best effort, it may not match exactly.)*";
/// Appended when the last attempt could not be verified at all.
pub const VERIFY_TROUBLE_NOTE: &str = "\n*(I had trouble verifying this image.)*";
/// Sent when posting an image fails.
pub const SEND_FAILED_NOTICE: &str = "I generated an image, but had trouble sending it. Sorry!";

const VERIFY_PROMPT: &str = "You are checking a generated image. Does this image depict the \
following description: \"{prompt}\"? Answer with only YES or NO.";

/// Outcome of asking the completion service whether an image matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationVerdict {
    Match,
    Mismatch,
    /// The verification call itself failed.
    Indeterminate(String),
}

impl VerificationVerdict {
    /// Interpret the verifier's reply: exactly `YES` (case/whitespace
    /// insensitive) is a match, anything else is not.
    pub fn from_reply(reply: &str) -> Self {
        if reply.trim().to_uppercase() == "YES" {
            Self::Match
        } else {
            Self::Mismatch
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// An image was confirmed to match.
    Verified,
    /// Attempts ran out on a mismatch; the last image stays with a note.
    BestEffort,
    /// Attempts ran out on a failed verification; the last image stays with a note.
    Unverified,
    /// A regeneration failed; the previous image stays with an apology.
    ReplacementFailed,
    /// The first image could not be generated; only text was sent.
    ImageUnavailable,
    /// Posting failed; the run stopped.
    Aborted,
}

impl DeliveryOutcome {
    fn note(self) -> &'static str {
        match self {
            Self::BestEffort => BEST_EFFORT_NOTE,
            Self::Unverified => VERIFY_TROUBLE_NOTE,
            Self::ReplacementFailed => REPLACEMENT_FAILED_SUFFIX,
            Self::Verified | Self::ImageUnavailable | Self::Aborted => "",
        }
    }
}

/// What to do after a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Regenerate,
    GiveUp(DeliveryOutcome),
}

/// Retry policy. Mismatch and a failed verification both spend an attempt;
/// they only differ in the note left when attempts run out.
pub fn decide(attempt: u32, max_attempts: u32, verdict: &VerificationVerdict) -> Transition {
    match verdict {
        VerificationVerdict::Match => Transition::Accept,
        _ if attempt < max_attempts => Transition::Regenerate,
        VerificationVerdict::Mismatch => Transition::GiveUp(DeliveryOutcome::BestEffort),
        VerificationVerdict::Indeterminate(_) => Transition::GiveUp(DeliveryOutcome::Unverified),
    }
}

/// One image reply to deliver
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub conversation_id: String,
    pub leading_text: String,
    pub image_prompt: String,
    pub reply_to: Option<String>,
}

impl DeliveryRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        leading_text: impl Into<String>,
        image_prompt: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            leading_text: leading_text.into(),
            image_prompt: image_prompt.into(),
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// A posted message and the text it currently shows
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMessage {
    pub handle: MessageHandle,
    pub display_text: String,
}

/// Per-attempt record
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// 1-based
    pub number: u32,
    pub prompt: String,
    pub live: Option<LiveMessage>,
    /// Bytes of the image most recently posted
    pub posted_image: Option<Vec<u8>>,
}

impl DeliveryAttempt {
    fn first(prompt: &str) -> Self {
        Self {
            number: 1,
            prompt: prompt.to_string(),
            live: None,
            posted_image: None,
        }
    }

    fn next(self) -> Self {
        Self {
            number: self.number + 1,
            ..self
        }
    }

    fn posted(self, live: LiveMessage, image: Vec<u8>) -> Self {
        Self {
            live: Some(live),
            posted_image: Some(image),
            ..self
        }
    }
}

/// Result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    /// Number of attempts started
    pub attempts: u32,
    /// The message left visible, if any
    pub handle: Option<MessageHandle>,
    /// Text the visible message shows
    pub final_text: Option<String>,
}

#[derive(Debug)]
enum DeliveryState {
    Generating(DeliveryAttempt),
    Posting(DeliveryAttempt, Vec<u8>),
    Verifying(DeliveryAttempt),
    Finalizing {
        attempt: DeliveryAttempt,
        text: String,
        outcome: DeliveryOutcome,
    },
    Done(DeliveryReport),
}

/// Append `suffix` to `base`, dropping the separating whitespace when `base`
/// is blank.
fn with_suffix(base: &str, suffix: &str) -> String {
    if base.trim().is_empty() {
        suffix.trim_start().to_string()
    } else {
        format!("{}{}", base, suffix)
    }
}

/// Runs the verified image delivery state machine.
pub struct ImageDeliveryMachine {
    completion: Arc<dyn CompletionGateway>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    verifier_model: Option<String>,
    max_attempts: u32,
}

impl ImageDeliveryMachine {
    pub fn new(
        completion: Arc<dyn CompletionGateway>,
        synthesizer: Arc<dyn ImageSynthesizer>,
    ) -> Self {
        Self {
            completion,
            synthesizer,
            verifier_model: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Total attempts, first one included; clamped to at least 1
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Model asked to judge images (gateway default when unset)
    pub fn with_verifier_model(mut self, model: impl Into<String>) -> Self {
        self.verifier_model = Some(model.into());
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Deliver one image reply. Always terminates; failures are reflected in
    /// the report rather than returned as errors.
    pub async fn run(&self, request: &DeliveryRequest, chat: &dyn ChatDelivery) -> DeliveryReport {
        info!(
            conversation_id = %request.conversation_id,
            max_attempts = self.max_attempts,
            "Starting image delivery"
        );

        let mut state = DeliveryState::Generating(DeliveryAttempt::first(&request.image_prompt));
        loop {
            state = match state {
                DeliveryState::Generating(attempt) => self.generate(request, chat, attempt).await,
                DeliveryState::Posting(attempt, image) => {
                    self.post(request, chat, attempt, image).await
                }
                DeliveryState::Verifying(attempt) => self.verify(request, attempt).await,
                DeliveryState::Finalizing {
                    attempt,
                    text,
                    outcome,
                } => Self::finalize(chat, attempt, text, outcome).await,
                DeliveryState::Done(report) => {
                    info!(
                        conversation_id = %request.conversation_id,
                        outcome = ?report.outcome,
                        attempts = report.attempts,
                        "Image delivery finished"
                    );
                    return report;
                }
            };
        }
    }

    async fn generate(
        &self,
        request: &DeliveryRequest,
        chat: &dyn ChatDelivery,
        attempt: DeliveryAttempt,
    ) -> DeliveryState {
        debug!(attempt = attempt.number, "Generating image");

        let error = match self.synthesizer.synthesize(&attempt.prompt).await {
            Ok(image) if !image.is_empty() => return DeliveryState::Posting(attempt, image),
            Ok(_) => "synthesizer returned no bytes".to_string(),
            Err(err) => err.to_string(),
        };

        if attempt.live.is_some() {
            warn!(
                attempt = attempt.number,
                "Replacement image failed, keeping previous image: {}", error
            );
            let outcome = DeliveryOutcome::ReplacementFailed;
            return DeliveryState::Finalizing {
                text: with_suffix(&request.leading_text, outcome.note()),
                attempt,
                outcome,
            };
        }

        warn!("Image generation failed, sending text only: {}", error);
        let handle = if request.leading_text.trim().is_empty() {
            None
        } else {
            let message = text_message(request, &request.leading_text);
            match chat.send(message).await {
                Ok(handle) => Some(handle),
                Err(err) => {
                    error!("Failed to send reply text: {}", err);
                    None
                }
            }
        };

        DeliveryState::Done(DeliveryReport {
            outcome: DeliveryOutcome::ImageUnavailable,
            attempts: attempt.number,
            final_text: handle.as_ref().map(|_| request.leading_text.clone()),
            handle,
        })
    }

    async fn post(
        &self,
        request: &DeliveryRequest,
        chat: &dyn ChatDelivery,
        attempt: DeliveryAttempt,
        image: Vec<u8>,
    ) -> DeliveryState {
        let text = match &attempt.live {
            None => request.leading_text.clone(),
            Some(previous) => {
                if let Err(err) = chat.delete(&previous.handle).await {
                    warn!(
                        attempt = attempt.number,
                        "Failed to delete previous image {}, it may stay visible: {}",
                        previous.handle,
                        err
                    );
                }
                with_suffix(&request.leading_text, REPLACING_SUFFIX)
            }
        };

        let mut message = OutboundMessage::image(&request.conversation_id, &text, image.clone());
        if let Some(reply_to) = &request.reply_to {
            message = message.with_reply_to(reply_to);
        }
        let display_text = message.display_text().to_string();

        match chat.send(message).await {
            Ok(handle) => {
                debug!(attempt = attempt.number, "Posted image as {}", handle);
                DeliveryState::Verifying(attempt.posted(
                    LiveMessage {
                        handle,
                        display_text,
                    },
                    image,
                ))
            }
            Err(err) => {
                error!(
                    attempt = attempt.number,
                    "Failed to post image, aborting delivery: {}", err
                );
                let notice = text_message(request, SEND_FAILED_NOTICE);
                if let Err(err) = chat.send(notice).await {
                    error!("Failed to send fallback notice: {}", err);
                }
                DeliveryState::Done(DeliveryReport {
                    outcome: DeliveryOutcome::Aborted,
                    attempts: attempt.number,
                    handle: None,
                    final_text: None,
                })
            }
        }
    }

    async fn verify(&self, request: &DeliveryRequest, attempt: DeliveryAttempt) -> DeliveryState {
        let verdict = match &attempt.posted_image {
            Some(image) => self.judge(&attempt.prompt, image).await,
            None => VerificationVerdict::Indeterminate("no image was posted".to_string()),
        };
        debug!(attempt = attempt.number, verdict = ?verdict, "Image verified");

        match decide(attempt.number, self.max_attempts, &verdict) {
            Transition::Accept => DeliveryState::Finalizing {
                text: request.leading_text.clone(),
                attempt,
                outcome: DeliveryOutcome::Verified,
            },
            Transition::Regenerate => {
                info!(
                    attempt = attempt.number,
                    verdict = ?verdict,
                    "Image rejected, regenerating"
                );
                DeliveryState::Generating(attempt.next())
            }
            Transition::GiveUp(outcome) => DeliveryState::Finalizing {
                text: with_suffix(&request.leading_text, outcome.note()),
                attempt,
                outcome,
            },
        }
    }

    /// Ask the completion service, statelessly, whether `image` shows `prompt`.
    async fn judge(&self, prompt: &str, image: &[u8]) -> VerificationVerdict {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let mut request = CompletionRequest::new(VERIFY_PROMPT.replace("{prompt}", prompt))
            .with_context(ContinuationToken::empty())
            .with_images(vec![encoded]);
        if let Some(model) = &self.verifier_model {
            request = request.with_model(model.clone());
        }

        match self.completion.complete(request).await {
            Ok(response) => VerificationVerdict::from_reply(&response.text),
            Err(err) => {
                warn!("Image verification failed: {}", err);
                VerificationVerdict::Indeterminate(err.to_string())
            }
        }
    }

    async fn finalize(
        chat: &dyn ChatDelivery,
        attempt: DeliveryAttempt,
        text: String,
        outcome: DeliveryOutcome,
    ) -> DeliveryState {
        let Some(live) = attempt.live else {
            return DeliveryState::Done(DeliveryReport {
                outcome,
                attempts: attempt.number,
                handle: None,
                final_text: None,
            });
        };

        // The report carries whatever the message really shows.
        let (handle, shown) = if live.display_text == text {
            (live.handle, text)
        } else {
            match chat.edit(&live.handle, &text).await {
                Ok(edited) => (edited, text),
                Err(err) => {
                    warn!("Failed to update image caption: {}", err);
                    (live.handle, live.display_text)
                }
            }
        };

        DeliveryState::Done(DeliveryReport {
            outcome,
            attempts: attempt.number,
            handle: Some(handle),
            final_text: Some(shown),
        })
    }
}

fn text_message(request: &DeliveryRequest, text: &str) -> OutboundMessage {
    let message = OutboundMessage::text(&request.conversation_id, text);
    match &request.reply_to {
        Some(reply_to) => message.with_reply_to(reply_to),
        None => message,
    }
}
