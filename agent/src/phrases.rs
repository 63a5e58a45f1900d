//! Everything the agent says, keyed by language.
//!
//! Tools return structured results; the session formats speech from these
//! tables. Keeping the full surface here means a translation review touches
//! one file.

use crate::language::Language;

pub fn greeting() -> String {
    // Language is unknown until the caller speaks, so the opener is
    // bilingual in the two most common caller languages.
    "Good evening, you've reached the men's shelter. How can I help you? \
     Buenas noches, ha llamado al albergue. ¿En qué puedo ayudarle?"
        .to_string()
}

pub fn beds_available(lang: Language, count: u32) -> String {
    match lang {
        Language::En => format!("We have {count} beds open tonight."),
        Language::Es => format!("Tenemos {count} camas disponibles esta noche."),
        Language::Pt => format!("Temos {count} camas disponíveis esta noite."),
        Language::Fr => format!("Nous avons {count} lits disponibles ce soir."),
    }
}

pub fn no_capacity(lang: Language) -> String {
    match lang {
        Language::En => {
            "I'm sorry, every bed is taken tonight. Please call back tomorrow or ask about other services.".into()
        }
        Language::Es => {
            "Lo siento, todas las camas están ocupadas esta noche. Llame mañana o pregunte por otros servicios.".into()
        }
        Language::Pt => {
            "Sinto muito, todas as camas estão ocupadas esta noite. Ligue amanhã ou pergunte sobre outros serviços.".into()
        }
        Language::Fr => {
            "Je suis désolé, tous les lits sont pris ce soir. Rappelez demain ou demandez nos autres services.".into()
        }
    }
}

pub fn ask_name(lang: Language) -> String {
    match lang {
        Language::En => "May I have your name?".into(),
        Language::Es => "¿Me puede dar su nombre?".into(),
        Language::Pt => "Pode me dizer seu nome?".into(),
        Language::Fr => "Puis-je avoir votre nom ?".into(),
    }
}

pub fn ask_situation(lang: Language) -> String {
    match lang {
        Language::En => "Can you tell me a little about your situation?".into(),
        Language::Es => "¿Puede contarme un poco sobre su situación?".into(),
        Language::Pt => "Pode me contar um pouco sobre sua situação?".into(),
        Language::Fr => "Pouvez-vous me parler un peu de votre situation ?".into(),
    }
}

pub fn ask_needs(lang: Language) -> String {
    match lang {
        Language::En => "Any special needs we should know about? Say 'none' if not.".into(),
        Language::Es => "¿Alguna necesidad especial que debamos saber? Diga 'ninguna' si no.".into(),
        Language::Pt => "Alguma necessidade especial que devamos saber? Diga 'nenhuma' se não.".into(),
        Language::Fr => "Des besoins particuliers à signaler ? Dites « aucun » sinon.".into(),
    }
}

pub fn confirm_booking(lang: Language, name: &str) -> String {
    match lang {
        Language::En => format!("Thank you, {name}. Shall I reserve a bed for you tonight?"),
        Language::Es => format!("Gracias, {name}. ¿Le reservo una cama para esta noche?"),
        Language::Pt => format!("Obrigado, {name}. Reservo uma cama para esta noite?"),
        Language::Fr => format!("Merci, {name}. Je vous réserve un lit pour ce soir ?"),
    }
}

pub fn booking_confirmed(lang: Language, code: &str, bed_id: u16, hold_hours: u64) -> String {
    match lang {
        Language::En => format!(
            "You're booked: bed {bed_id}, confirmation code {code}. The bed is held for {hold_hours} hours, so please arrive before then."
        ),
        Language::Es => format!(
            "Reservado: cama {bed_id}, código de confirmación {code}. La cama se mantiene por {hold_hours} horas, llegue antes de ese plazo."
        ),
        Language::Pt => format!(
            "Reservado: cama {bed_id}, código de confirmação {code}. A cama fica reservada por {hold_hours} horas, chegue antes disso."
        ),
        Language::Fr => format!(
            "C'est réservé : lit {bed_id}, code de confirmation {code}. Le lit est gardé {hold_hours} heures, merci d'arriver avant."
        ),
    }
}

pub fn already_booked(lang: Language, code: &str) -> String {
    match lang {
        Language::En => format!("You already have a reservation this call; your code is {code}."),
        Language::Es => format!("Ya tiene una reserva en esta llamada; su código es {code}."),
        Language::Pt => format!("Você já tem uma reserva nesta chamada; seu código é {code}."),
        Language::Fr => format!("Vous avez déjà une réservation ; votre code est {code}."),
    }
}

pub fn booking_declined(lang: Language) -> String {
    match lang {
        Language::En => "No problem, I won't reserve anything.".into(),
        Language::Es => "Sin problema, no reservaré nada.".into(),
        Language::Pt => "Sem problema, não vou reservar nada.".into(),
        Language::Fr => "Pas de souci, je ne réserve rien.".into(),
    }
}

pub fn anything_else(lang: Language) -> String {
    match lang {
        Language::En => "Is there anything else I can help with?".into(),
        Language::Es => "¿Puedo ayudarle con algo más?".into(),
        Language::Pt => "Posso ajudar com mais alguma coisa?".into(),
        Language::Fr => "Puis-je vous aider avec autre chose ?".into(),
    }
}

pub fn hotline(lang: Language) -> String {
    match lang {
        Language::En => {
            "I hear you, and your life matters. Please call or text the Suicide and Crisis Lifeline at 988 right now; they are there around the clock.".into()
        }
        Language::Es => {
            "Le escucho, y su vida importa. Por favor llame o envíe un mensaje a la Línea de Prevención del Suicidio al 988 ahora mismo; atienden a toda hora.".into()
        }
        Language::Pt => {
            "Eu entendo, e a sua vida importa. Por favor ligue agora para a Linha de Crise no número 988; eles atendem a qualquer hora.".into()
        }
        Language::Fr => {
            "Je vous entends, et votre vie compte. Appelez tout de suite la ligne de crise au 988 ; ils répondent jour et nuit.".into()
        }
    }
}

pub fn donation_info(lang: Language) -> String {
    match lang {
        Language::En => {
            "Thank you for thinking of us. Donations are received weekdays 9 to 5 at the front office, or through our website.".into()
        }
        Language::Es => {
            "Gracias por pensar en nosotros. Recibimos donaciones de lunes a viernes de 9 a 5 en la oficina, o por nuestro sitio web.".into()
        }
        Language::Pt => {
            "Obrigado por pensar em nós. Recebemos doações de segunda a sexta, das 9 às 17, na recepção, ou pelo nosso site.".into()
        }
        Language::Fr => {
            "Merci de penser à nous. Les dons sont reçus en semaine de 9 h à 17 h à l'accueil, ou sur notre site web.".into()
        }
    }
}

pub fn farewell(lang: Language) -> String {
    match lang {
        Language::En => "Take care, goodbye.".into(),
        Language::Es => "Cuídese, adiós.".into(),
        Language::Pt => "Se cuide, tchau.".into(),
        Language::Fr => "Prenez soin de vous, au revoir.".into(),
    }
}

pub fn clarify(lang: Language) -> String {
    match lang {
        Language::En => {
            "I can help with a bed for tonight, chapel services, volunteering, or donations. What do you need?".into()
        }
        Language::Es => {
            "Puedo ayudar con una cama para esta noche, servicios de capilla, voluntariado o donaciones. ¿Qué necesita?".into()
        }
        Language::Pt => {
            "Posso ajudar com uma cama para esta noite, cultos na capela, voluntariado ou doações. O que você precisa?".into()
        }
        Language::Fr => {
            "Je peux vous aider pour un lit ce soir, les services à la chapelle, le bénévolat ou les dons. Que vous faut-il ?".into()
        }
    }
}

pub fn apologize_delay(lang: Language) -> String {
    match lang {
        Language::En => "I'm sorry, our system is slow right now. One moment.".into(),
        Language::Es => "Disculpe, el sistema está lento en este momento. Un momento.".into(),
        Language::Pt => "Desculpe, o sistema está lento agora. Um momento.".into(),
        Language::Fr => "Désolé, notre système est lent en ce moment. Un instant.".into(),
    }
}

pub fn degraded(lang: Language) -> String {
    match lang {
        Language::En => {
            "I'm sorry, I can't reach our booking system. Please call back in a few minutes.".into()
        }
        Language::Es => {
            "Lo siento, no puedo acceder al sistema de reservas. Llame de nuevo en unos minutos.".into()
        }
        Language::Pt => {
            "Sinto muito, não consigo acessar o sistema de reservas. Ligue novamente em alguns minutos.".into()
        }
        Language::Fr => {
            "Désolé, je n'arrive pas à joindre notre système. Rappelez dans quelques minutes.".into()
        }
    }
}

// -----------------------
// Chapel flow
// -----------------------

pub fn ask_chapel_date(lang: Language) -> String {
    match lang {
        Language::En => "What date would you like, as year-month-day? We hold services on weekdays.".into(),
        Language::Es => "¿Qué fecha desea, en formato año-mes-día? Hay servicios de lunes a viernes.".into(),
        Language::Pt => "Que data deseja, no formato ano-mês-dia? Os cultos são de segunda a sexta.".into(),
        Language::Fr => "Quelle date souhaitez-vous, au format année-mois-jour ? Les services ont lieu en semaine.".into(),
    }
}

pub fn ask_chapel_time(lang: Language) -> String {
    match lang {
        Language::En => "Which time: 10:00, 13:00, or 19:00?".into(),
        Language::Es => "¿Qué hora: 10:00, 13:00 o 19:00?".into(),
        Language::Pt => "Qual horário: 10:00, 13:00 ou 19:00?".into(),
        Language::Fr => "Quelle heure : 10h00, 13h00 ou 19h00 ?".into(),
    }
}

pub fn ask_chapel_group(lang: Language) -> String {
    match lang {
        Language::En => "What is the name of your group?".into(),
        Language::Es => "¿Cómo se llama su grupo?".into(),
        Language::Pt => "Qual é o nome do seu grupo?".into(),
        Language::Fr => "Quel est le nom de votre groupe ?".into(),
    }
}

pub fn ask_chapel_contact(lang: Language) -> String {
    match lang {
        Language::En => "And a contact phone or email for the group?".into(),
        Language::Es => "¿Y un teléfono o correo de contacto del grupo?".into(),
        Language::Pt => "E um telefone ou e-mail de contato do grupo?".into(),
        Language::Fr => "Et un téléphone ou un courriel de contact pour le groupe ?".into(),
    }
}

pub fn chapel_confirmed(lang: Language, date: &str, time: &str) -> String {
    match lang {
        Language::En => format!("Your chapel service is scheduled for {date} at {time}."),
        Language::Es => format!("Su servicio de capilla queda programado para el {date} a las {time}."),
        Language::Pt => format!("Seu culto na capela está agendado para {date} às {time}."),
        Language::Fr => format!("Votre service à la chapelle est prévu le {date} à {time}."),
    }
}

pub fn chapel_weekend(lang: Language) -> String {
    match lang {
        Language::En => "We don't hold chapel services on weekends. Could you pick a weekday?".into(),
        Language::Es => "No hay servicios de capilla los fines de semana. ¿Puede elegir un día entre semana?".into(),
        Language::Pt => "Não há cultos aos fins de semana. Pode escolher um dia útil?".into(),
        Language::Fr => "Pas de service le week-end. Pouvez-vous choisir un jour de semaine ?".into(),
    }
}

pub fn chapel_bad_date(lang: Language) -> String {
    match lang {
        Language::En => "I didn't catch that date. Please give it as year-month-day, like 2026-08-03.".into(),
        Language::Es => "No entendí la fecha. Dígala como año-mes-día, por ejemplo 2026-08-03.".into(),
        Language::Pt => "Não entendi a data. Diga como ano-mês-dia, por exemplo 2026-08-03.".into(),
        Language::Fr => "Je n'ai pas saisi la date. Donnez-la au format année-mois-jour, par exemple 2026-08-03.".into(),
    }
}

pub fn chapel_bad_time(lang: Language) -> String {
    match lang {
        Language::En => "That time isn't available; services start at 10:00, 13:00, or 19:00.".into(),
        Language::Es => "Esa hora no está disponible; los servicios empiezan a las 10:00, 13:00 o 19:00.".into(),
        Language::Pt => "Esse horário não está disponível; os cultos começam às 10:00, 13:00 ou 19:00.".into(),
        Language::Fr => "Cette heure n'est pas disponible ; les services commencent à 10h00, 13h00 ou 19h00.".into(),
    }
}

pub fn chapel_slot_taken(lang: Language) -> String {
    match lang {
        Language::En => "That slot is already booked. Would another time work?".into(),
        Language::Es => "Ese horario ya está reservado. ¿Le sirve otra hora?".into(),
        Language::Pt => "Esse horário já está reservado. Outro horário serve?".into(),
        Language::Fr => "Ce créneau est déjà pris. Une autre heure vous conviendrait ?".into(),
    }
}

// -----------------------
// Volunteer flow
// -----------------------

pub fn ask_volunteer_name(lang: Language) -> String {
    match lang {
        Language::En => "Wonderful. What's your full name?".into(),
        Language::Es => "Excelente. ¿Cuál es su nombre completo?".into(),
        Language::Pt => "Ótimo. Qual é o seu nome completo?".into(),
        Language::Fr => "Formidable. Quel est votre nom complet ?".into(),
    }
}

pub fn ask_volunteer_phone(lang: Language) -> String {
    match lang {
        Language::En => "What phone number can we reach you at?".into(),
        Language::Es => "¿A qué número de teléfono podemos llamarle?".into(),
        Language::Pt => "Em qual telefone podemos falar com você?".into(),
        Language::Fr => "À quel numéro peut-on vous joindre ?".into(),
    }
}

pub fn ask_volunteer_email(lang: Language) -> String {
    match lang {
        Language::En => "An email address too? Say 'none' to skip.".into(),
        Language::Es => "¿También un correo electrónico? Diga 'ninguno' para omitir.".into(),
        Language::Pt => "Um e-mail também? Diga 'nenhum' para pular.".into(),
        Language::Fr => "Un courriel aussi ? Dites « aucun » pour passer.".into(),
    }
}

pub fn ask_volunteer_availability(lang: Language) -> String {
    match lang {
        Language::En => "Which days or shifts are you available?".into(),
        Language::Es => "¿Qué días o turnos tiene disponibles?".into(),
        Language::Pt => "Quais dias ou turnos você tem disponíveis?".into(),
        Language::Fr => "Quels jours ou créneaux êtes-vous disponible ?".into(),
    }
}

pub fn ask_volunteer_interests(lang: Language) -> String {
    match lang {
        Language::En => "What kind of work interests you, like kitchen, intake, or maintenance?".into(),
        Language::Es => "¿Qué tipo de trabajo le interesa, como cocina, recepción o mantenimiento?".into(),
        Language::Pt => "Que tipo de trabalho lhe interessa, como cozinha, recepção ou manutenção?".into(),
        Language::Fr => "Quel type de travail vous intéresse : cuisine, accueil, entretien ?".into(),
    }
}

pub fn volunteer_confirmed(lang: Language, name: &str) -> String {
    match lang {
        Language::En => format!("Thank you, {name}! You're registered; our volunteer coordinator will reach out."),
        Language::Es => format!("¡Gracias, {name}! Ya está registrado; nuestra coordinadora de voluntarios le contactará."),
        Language::Pt => format!("Obrigado, {name}! Você está registrado; nossa coordenação de voluntários entrará em contato."),
        Language::Fr => format!("Merci, {name} ! Vous êtes inscrit ; notre coordination des bénévoles vous contactera."),
    }
}

// -----------------------
// Yes / no
// -----------------------

const AFFIRMATIVE: &[&str] = &[
    "yes", "yeah", "yep", "sure", "please", "ok", "okay", "sí", "si", "claro", "sim", "oui",
    "d'accord",
];

const NEGATIVE: &[&str] = &["no", "not", "nope", "não", "nao", "non"];

pub fn is_affirmative(utterance: &str) -> bool {
    let normalized = utterance.to_lowercase();
    let words: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();
    // A leading "no" wins over a trailing "ok" ("no, that's ok").
    for w in &words {
        if NEGATIVE.contains(w) {
            return false;
        }
        if AFFIRMATIVE.contains(w) {
            return true;
        }
    }
    normalized.contains("d'accord")
}

pub fn is_negative(utterance: &str) -> bool {
    let normalized = utterance.to_lowercase();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| NEGATIVE.contains(&w))
}

/// "none"-style answers for optional slots.
pub fn is_none_answer(utterance: &str) -> bool {
    let normalized = utterance.trim().to_lowercase();
    [
        "none", "nothing", "no", "ninguna", "ninguno", "nada", "nenhuma", "nenhum", "aucun",
        "aucune", "rien",
    ]
    .contains(&normalized.as_str())
}
