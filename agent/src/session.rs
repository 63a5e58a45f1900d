//! The per-call state machine.
//!
//! A session consumes transcribed utterances and produces reply texts,
//! driving the engine only through the tool router. All conversational
//! state is in memory and dies with the call; only committed tool effects
//! persist.
//!
//! Two transitions preempt every state: an explicit crisis phrase routes to
//! the hotline and ends the call, and an explicit farewell phrase ends it.
//! Committed flows are exactly-once: a second attempt to fire a committed
//! tool repeats the existing confirmation instead of calling again.

use std::sync::Arc;

use tracing::{info, instrument};

use engine::allocation::{Allocated, AllocationRequest};
use engine::chapel::{ChapelBooking, ChapelRequest};
use engine::error::EngineError;
use engine::volunteers::{VolunteerRecord, VolunteerRequest};

use crate::intents::{Intent, IntentClassifier};
use crate::language::{self, Language};
use crate::phrases;
use crate::tools::{ToolError, ToolRouter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedSlot {
    Name,
    Situation,
    Needs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapelSlot {
    Date,
    Time,
    Group,
    Contact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolunteerSlot {
    Name,
    Phone,
    Email,
    Availability,
    Interests,
}

/// Where the conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Greeting,
    ClassifyIntent,
    GatherBedSlots(BedSlot),
    ConfirmBed,
    GatherChapelSlots(ChapelSlot),
    GatherVolunteerSlots(VolunteerSlot),
    Farewell,
}

#[derive(Debug, Default)]
struct BedSlots {
    name: Option<String>,
    situation: Option<String>,
    needs: Option<String>,
}

#[derive(Debug, Default)]
struct ChapelSlots {
    date: Option<String>,
    time: Option<String>,
    group: Option<String>,
    contact: Option<String>,
}

#[derive(Debug, Default)]
struct VolunteerSlots {
    name: Option<String>,
    phone: Option<String>,
    /// `Some(None)` records an explicitly skipped email.
    email: Option<Option<String>>,
    availability: Option<Vec<String>>,
    interests: Option<Vec<String>>,
}

/// Side effects this session already committed. Checked before any tool
/// fires again.
#[derive(Debug, Default)]
struct Committed {
    bed: Option<Allocated>,
    chapel: Option<ChapelBooking>,
    volunteer: Option<VolunteerRecord>,
}

pub struct CallSession {
    id: String,
    tools: Arc<ToolRouter>,
    classifier: Arc<IntentClassifier>,

    state: CallState,
    language: Option<Language>,

    bed_slots: BedSlots,
    chapel_slots: ChapelSlots,
    volunteer_slots: VolunteerSlots,
    committed: Committed,

    hold_hours: u64,
    ended: bool,
}

impl CallSession {
    pub fn new(
        id: impl Into<String>,
        tools: Arc<ToolRouter>,
        classifier: Arc<IntentClassifier>,
        hold_hours: u64,
    ) -> Self {
        Self {
            id: id.into(),
            tools,
            classifier,
            state: CallState::Greeting,
            language: None,
            bed_slots: BedSlots::default(),
            chapel_slots: ChapelSlots::default(),
            volunteer_slots: VolunteerSlots::default(),
            committed: Committed::default(),
            hold_hours,
            ended: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn detected_language(&self) -> Option<Language> {
        self.language
    }

    pub fn reservation(&self) -> Option<&Allocated> {
        self.committed.bed.as_ref()
    }

    /// Call setup: the opener the bridge plays before the caller speaks.
    pub fn open(&mut self) -> String {
        self.state = CallState::ClassifyIntent;
        phrases::greeting()
    }

    fn lang(&self) -> Language {
        self.language.unwrap_or(Language::En)
    }

    /// Consume one caller utterance and produce the replies to speak.
    #[instrument(skip(self, utterance), target = "session", fields(call_id = %self.id))]
    pub async fn handle_utterance(&mut self, utterance: &str) -> Vec<String> {
        if self.ended {
            return Vec::new();
        }

        let text = utterance.trim();
        if text.is_empty() {
            return vec![phrases::clarify(self.lang())];
        }

        // Latch the language on the first substantive utterance. Mid-call
        // switches are honored but not sought out.
        if self.language.is_none() {
            self.language = language::detect(text);
        }
        let lang = self.lang();

        // Crisis phrases preempt every state, commit nothing, and end the
        // call on the hotline message.
        if self.classifier.is_crisis(text) {
            info!(language = %lang, "crisis phrase detected; routing to hotline");
            self.ended = true;
            self.state = CallState::Farewell;
            return vec![phrases::hotline(lang), phrases::farewell(lang)];
        }

        // Farewell phrases end any state. The list is exact phrases, so a
        // slot answer that merely contains "no" does not hang up the call.
        if self.classifier.is_farewell(text) {
            self.ended = true;
            self.state = CallState::Farewell;
            return vec![phrases::farewell(lang)];
        }

        match self.state {
            CallState::Greeting => {
                self.state = CallState::ClassifyIntent;
                self.classify_and_route(text, lang).await
            }
            CallState::ClassifyIntent => self.classify_and_route(text, lang).await,
            CallState::GatherBedSlots(slot) => self.gather_bed_slot(slot, text, lang).await,
            CallState::ConfirmBed => self.confirm_bed(text, lang).await,
            CallState::GatherChapelSlots(slot) => self.gather_chapel_slot(slot, text, lang).await,
            CallState::GatherVolunteerSlots(slot) => {
                self.gather_volunteer_slot(slot, text, lang).await
            }
            CallState::Farewell => {
                self.ended = true;
                vec![phrases::farewell(lang)]
            }
        }
    }

    async fn classify_and_route(&mut self, text: &str, lang: Language) -> Vec<String> {
        match self.classifier.classify(text) {
            Intent::BedInquiry => {
                if let Some(allocated) = &self.committed.bed {
                    return vec![
                        phrases::already_booked(lang, &allocated.code),
                        phrases::anything_else(lang),
                    ];
                }

                match self.tools.check_availability().await {
                    Ok(0) => vec![phrases::no_capacity(lang), phrases::anything_else(lang)],
                    Ok(count) => {
                        let mut replies = vec![phrases::beds_available(lang, count)];
                        replies.extend(self.advance_bed_flow(lang));
                        replies
                    }
                    Err(e) => self.tool_failure(e, lang),
                }
            }
            Intent::Chapel => {
                if let Some(booking) = &self.committed.chapel {
                    return vec![
                        phrases::chapel_confirmed(lang, &booking.service_date, &booking.service_time),
                        phrases::anything_else(lang),
                    ];
                }
                self.advance_chapel_flow(lang).await
            }
            Intent::Volunteer => {
                if let Some(record) = &self.committed.volunteer {
                    return vec![
                        phrases::volunteer_confirmed(lang, &record.name),
                        phrases::anything_else(lang),
                    ];
                }
                self.advance_volunteer_flow(lang).await
            }
            Intent::Donation => {
                vec![phrases::donation_info(lang), phrases::anything_else(lang)]
            }
            // Crisis and farewell were intercepted above; a stray
            // classification lands in clarify like any other unknown.
            Intent::Crisis | Intent::Farewell | Intent::Other => {
                vec![phrases::clarify(lang)]
            }
        }
    }

    // -----------------------
    // Bed flow
    // -----------------------

    async fn gather_bed_slot(&mut self, slot: BedSlot, text: &str, lang: Language) -> Vec<String> {
        match slot {
            BedSlot::Name => self.bed_slots.name = Some(text.to_string()),
            BedSlot::Situation => self.bed_slots.situation = Some(text.to_string()),
            BedSlot::Needs => {
                self.bed_slots.needs = Some(if phrases::is_none_answer(text) {
                    String::new()
                } else {
                    text.to_string()
                });
            }
        }
        self.advance_bed_flow(lang)
    }

    /// Elicit the next missing bed slot, or move to confirmation once the
    /// flow has everything it needs.
    fn advance_bed_flow(&mut self, lang: Language) -> Vec<String> {
        if self.bed_slots.name.is_none() {
            self.state = CallState::GatherBedSlots(BedSlot::Name);
            return vec![phrases::ask_name(lang)];
        }
        if self.bed_slots.situation.is_none() {
            self.state = CallState::GatherBedSlots(BedSlot::Situation);
            return vec![phrases::ask_situation(lang)];
        }
        if self.bed_slots.needs.is_none() {
            self.state = CallState::GatherBedSlots(BedSlot::Needs);
            return vec![phrases::ask_needs(lang)];
        }

        self.state = CallState::ConfirmBed;
        let name = self.bed_slots.name.clone().unwrap_or_default();
        vec![phrases::confirm_booking(lang, &name)]
    }

    async fn confirm_bed(&mut self, text: &str, lang: Language) -> Vec<String> {
        if phrases::is_affirmative(text) {
            return self.allocate_bed(lang).await;
        }
        if phrases::is_negative(text) {
            self.state = CallState::ClassifyIntent;
            return vec![phrases::booking_declined(lang), phrases::anything_else(lang)];
        }
        vec![phrases::confirm_booking(
            lang,
            &self.bed_slots.name.clone().unwrap_or_default(),
        )]
    }

    async fn allocate_bed(&mut self, lang: Language) -> Vec<String> {
        // Exactly-once: a committed bed flow never fires the tool again.
        if let Some(allocated) = &self.committed.bed {
            self.state = CallState::ClassifyIntent;
            return vec![
                phrases::already_booked(lang, &allocated.code),
                phrases::anything_else(lang),
            ];
        }

        let req = AllocationRequest {
            caller_name: self.bed_slots.name.clone().unwrap_or_default(),
            situation: self.bed_slots.situation.clone().unwrap_or_default(),
            needs: self.bed_slots.needs.clone().unwrap_or_default(),
            language: lang.as_tag().to_string(),
        };

        match self.tools.reserve_bed(&req).await {
            Ok(allocated) => {
                info!(code = %allocated.code, bed_id = allocated.bed_id, "reservation committed");
                let reply = phrases::booking_confirmed(
                    lang,
                    &allocated.code,
                    allocated.bed_id,
                    self.hold_hours,
                );
                self.committed.bed = Some(allocated);
                self.state = CallState::ClassifyIntent;
                vec![reply, phrases::anything_else(lang)]
            }
            Err(ToolError::Engine(EngineError::NoCapacity)) => {
                self.state = CallState::ClassifyIntent;
                vec![phrases::no_capacity(lang), phrases::anything_else(lang)]
            }
            Err(e) => self.tool_failure(e, lang),
        }
    }

    // -----------------------
    // Chapel flow
    // -----------------------

    async fn gather_chapel_slot(
        &mut self,
        slot: ChapelSlot,
        text: &str,
        lang: Language,
    ) -> Vec<String> {
        match slot {
            ChapelSlot::Date => self.chapel_slots.date = Some(text.to_string()),
            ChapelSlot::Time => self.chapel_slots.time = Some(normalize_time(text)),
            ChapelSlot::Group => self.chapel_slots.group = Some(text.to_string()),
            ChapelSlot::Contact => self.chapel_slots.contact = Some(text.to_string()),
        }
        self.advance_chapel_flow(lang).await
    }

    /// Elicit the next missing chapel slot; once all four are present the
    /// booking fires. A validation failure clears the offending slot, so
    /// this loop re-elicits exactly that one.
    async fn advance_chapel_flow(&mut self, lang: Language) -> Vec<String> {
        if self.chapel_slots.date.is_none() {
            self.state = CallState::GatherChapelSlots(ChapelSlot::Date);
            return vec![phrases::ask_chapel_date(lang)];
        }
        if self.chapel_slots.time.is_none() {
            self.state = CallState::GatherChapelSlots(ChapelSlot::Time);
            return vec![phrases::ask_chapel_time(lang)];
        }
        if self.chapel_slots.group.is_none() {
            self.state = CallState::GatherChapelSlots(ChapelSlot::Group);
            return vec![phrases::ask_chapel_group(lang)];
        }
        if self.chapel_slots.contact.is_none() {
            self.state = CallState::GatherChapelSlots(ChapelSlot::Contact);
            return vec![phrases::ask_chapel_contact(lang)];
        }

        self.schedule_chapel(lang).await
    }

    async fn schedule_chapel(&mut self, lang: Language) -> Vec<String> {
        if let Some(booking) = &self.committed.chapel {
            self.state = CallState::ClassifyIntent;
            return vec![
                phrases::chapel_confirmed(lang, &booking.service_date, &booking.service_time),
                phrases::anything_else(lang),
            ];
        }

        let req = ChapelRequest {
            service_date: self.chapel_slots.date.clone().unwrap_or_default(),
            service_time: self.chapel_slots.time.clone().unwrap_or_default(),
            group_name: self.chapel_slots.group.clone().unwrap_or_default(),
            contact: self.chapel_slots.contact.clone().unwrap_or_default(),
        };

        match self.tools.schedule_chapel_service(&req).await {
            Ok(booking) => {
                info!(booking_id = %booking.booking_id, "chapel booking committed");
                let reply =
                    phrases::chapel_confirmed(lang, &booking.service_date, &booking.service_time);
                self.committed.chapel = Some(booking);
                self.state = CallState::ClassifyIntent;
                vec![reply, phrases::anything_else(lang)]
            }
            // Validation failures clear the offending slot and loop back to
            // re-elicit exactly that one.
            Err(ToolError::Engine(EngineError::Validation(kind))) => {
                let reply = match kind.as_str() {
                    "weekend_disallowed" => {
                        self.chapel_slots.date = None;
                        self.state = CallState::GatherChapelSlots(ChapelSlot::Date);
                        phrases::chapel_weekend(lang)
                    }
                    "invalid_time" => {
                        self.chapel_slots.time = None;
                        self.state = CallState::GatherChapelSlots(ChapelSlot::Time);
                        phrases::chapel_bad_time(lang)
                    }
                    _ => {
                        self.chapel_slots.date = None;
                        self.state = CallState::GatherChapelSlots(ChapelSlot::Date);
                        phrases::chapel_bad_date(lang)
                    }
                };
                vec![reply]
            }
            Err(ToolError::Engine(EngineError::Conflict(_))) => {
                self.chapel_slots.time = None;
                self.state = CallState::GatherChapelSlots(ChapelSlot::Time);
                vec![phrases::chapel_slot_taken(lang), phrases::ask_chapel_time(lang)]
            }
            Err(e) => self.tool_failure(e, lang),
        }
    }

    // -----------------------
    // Volunteer flow
    // -----------------------

    async fn gather_volunteer_slot(
        &mut self,
        slot: VolunteerSlot,
        text: &str,
        lang: Language,
    ) -> Vec<String> {
        match slot {
            VolunteerSlot::Name => self.volunteer_slots.name = Some(text.to_string()),
            VolunteerSlot::Phone => self.volunteer_slots.phone = Some(text.to_string()),
            VolunteerSlot::Email => {
                self.volunteer_slots.email = Some(if phrases::is_none_answer(text) {
                    None
                } else {
                    Some(text.to_string())
                });
            }
            VolunteerSlot::Availability => {
                self.volunteer_slots.availability = Some(split_listing(text));
            }
            VolunteerSlot::Interests => {
                self.volunteer_slots.interests = Some(split_listing(text));
            }
        }
        self.advance_volunteer_flow(lang).await
    }

    async fn advance_volunteer_flow(&mut self, lang: Language) -> Vec<String> {
        if self.volunteer_slots.name.is_none() {
            self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Name);
            return vec![phrases::ask_volunteer_name(lang)];
        }
        if self.volunteer_slots.phone.is_none() {
            self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Phone);
            return vec![phrases::ask_volunteer_phone(lang)];
        }
        if self.volunteer_slots.email.is_none() {
            self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Email);
            return vec![phrases::ask_volunteer_email(lang)];
        }
        if self.volunteer_slots.availability.is_none() {
            self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Availability);
            return vec![phrases::ask_volunteer_availability(lang)];
        }
        if self.volunteer_slots.interests.is_none() {
            self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Interests);
            return vec![phrases::ask_volunteer_interests(lang)];
        }

        self.register_volunteer(lang).await
    }

    async fn register_volunteer(&mut self, lang: Language) -> Vec<String> {
        if let Some(record) = &self.committed.volunteer {
            self.state = CallState::ClassifyIntent;
            return vec![
                phrases::volunteer_confirmed(lang, &record.name),
                phrases::anything_else(lang),
            ];
        }

        let req = VolunteerRequest {
            name: self.volunteer_slots.name.clone().unwrap_or_default(),
            phone: self.volunteer_slots.phone.clone().unwrap_or_default(),
            email: self.volunteer_slots.email.clone().flatten(),
            availability: self.volunteer_slots.availability.clone().unwrap_or_default(),
            interests: self.volunteer_slots.interests.clone().unwrap_or_default(),
        };

        match self.tools.register_volunteer(&req).await {
            Ok(record) => {
                info!(volunteer_id = %record.volunteer_id, "volunteer registration committed");
                let reply = phrases::volunteer_confirmed(lang, &record.name);
                self.committed.volunteer = Some(record);
                self.state = CallState::ClassifyIntent;
                vec![reply, phrases::anything_else(lang)]
            }
            Err(ToolError::Engine(EngineError::Validation(_))) => {
                // A blank name or phone got through the conversation; clear
                // both and re-elicit from the top of the flow.
                self.volunteer_slots.name = None;
                self.volunteer_slots.phone = None;
                self.state = CallState::GatherVolunteerSlots(VolunteerSlot::Name);
                vec![phrases::ask_volunteer_name(lang)]
            }
            Err(e) => self.tool_failure(e, lang),
        }
    }

    /// A tool failed past its deadline or the engine is unreachable: the
    /// session apologizes and drops back to intent classification rather
    /// than wedging the flow.
    fn tool_failure(&mut self, err: ToolError, lang: Language) -> Vec<String> {
        tracing::warn!(call_id = %self.id, error = %err, "tool call failed");
        self.state = CallState::ClassifyIntent;
        match err {
            ToolError::Timeout => vec![phrases::apologize_delay(lang), phrases::degraded(lang)],
            ToolError::Engine(_) => vec![phrases::degraded(lang)],
        }
    }
}

/// "10", "10:00" and "10h00" all mean the 10:00 slot; the tool still
/// validates whatever comes out of this.
fn normalize_time(text: &str) -> String {
    let t = text.trim().to_lowercase().replace("h", ":");
    match t.trim_end_matches(":").trim() {
        "10" | "10:00" => "10:00".to_string(),
        "13" | "13:00" | "1 pm" | "1pm" => "13:00".to_string(),
        "19" | "19:00" | "7 pm" | "7pm" => "19:00".to_string(),
        other => other.to_string(),
    }
}

/// Split a spoken listing like "mondays, weekends and evenings".
fn split_listing(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .flat_map(|part| part.split(" and "))
        .flat_map(|part| part.split(" y "))
        .flat_map(|part| part.split(" e "))
        .flat_map(|part| part.split(" et "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
