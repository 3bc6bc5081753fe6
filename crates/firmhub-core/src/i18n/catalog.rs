use super::Language;

/// Keys of the localized message catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    AnswersInvalid,
    QuestionNotFound,
    DuplicateQuestion,
    TypeMismatch,
    InvalidDate,
    SchemaViolation,
    WrongAnswerKind,
    OptionNotInQuestion,
    EmptySelection,
    DuplicateSelection,
    RequiredQuestionMissing,
    ProfanityDetected,
    ProfileIncomplete,
    OrderNotContiguous,
    FieldRequired,
    FirmUpdateSubject,
    FirmApprovedBody,
    FirmRejectedBody,
    FirmSuspendedBody,
    FirmActivatedBody,
}

impl MessageKey {
    pub(crate) fn template(&self, lang: Language) -> &'static str {
        use Language::*;
        use MessageKey::*;
        match (self, lang) {
            (AnswersInvalid, En) => "One or more answers are invalid",
            (AnswersInvalid, Fr) => "Une ou plusieurs réponses sont invalides",
            (AnswersInvalid, De) => "Eine oder mehrere Antworten sind ungültig",

            (QuestionNotFound, En) => "Question {question_id} does not exist in this category",
            (QuestionNotFound, Fr) => {
                "La question {question_id} n'existe pas dans cette catégorie"
            }
            (QuestionNotFound, De) => {
                "Die Frage {question_id} existiert in dieser Kategorie nicht"
            }

            (DuplicateQuestion, En) => "Question {question_id} is answered more than once",
            (DuplicateQuestion, Fr) => "La question {question_id} a plusieurs réponses",
            (DuplicateQuestion, De) => "Die Frage {question_id} wurde mehrfach beantwortet",

            (TypeMismatch, En) => "Expected a value of type {expected}",
            (TypeMismatch, Fr) => "Une valeur de type {expected} est attendue",
            (TypeMismatch, De) => "Ein Wert vom Typ {expected} wird erwartet",

            (InvalidDate, En) => "Expected a date (YYYY-MM-DD)",
            (InvalidDate, Fr) => "Une date est attendue (AAAA-MM-JJ)",
            (InvalidDate, De) => "Ein Datum wird erwartet (JJJJ-MM-TT)",

            (SchemaViolation, En) => "Value does not satisfy the question rules: {detail}",
            (SchemaViolation, Fr) => {
                "La valeur ne respecte pas les règles de la question : {detail}"
            }
            (SchemaViolation, De) => "Der Wert erfüllt die Regeln der Frage nicht: {detail}",

            (WrongAnswerKind, En) => "Answer kind {kind} does not match a {question_type} question",
            (WrongAnswerKind, Fr) => {
                "Le type de réponse {kind} ne correspond pas à une question {question_type}"
            }
            (WrongAnswerKind, De) => {
                "Die Antwortart {kind} passt nicht zu einer Frage vom Typ {question_type}"
            }

            (OptionNotInQuestion, En) => "Option {option_id} does not belong to this question",
            (OptionNotInQuestion, Fr) => {
                "L'option {option_id} n'appartient pas à cette question"
            }
            (OptionNotInQuestion, De) => "Die Option {option_id} gehört nicht zu dieser Frage",

            (EmptySelection, En) => "Select at least one option",
            (EmptySelection, Fr) => "Sélectionnez au moins une option",
            (EmptySelection, De) => "Wählen Sie mindestens eine Option",

            (DuplicateSelection, En) => "Option {option_id} is selected more than once",
            (DuplicateSelection, Fr) => "L'option {option_id} est sélectionnée plusieurs fois",
            (DuplicateSelection, De) => "Die Option {option_id} ist mehrfach ausgewählt",

            (RequiredQuestionMissing, En) => "This question requires an answer",
            (RequiredQuestionMissing, Fr) => "Cette question nécessite une réponse",
            (RequiredQuestionMissing, De) => "Diese Frage muss beantwortet werden",

            (ProfanityDetected, En) => "Contains inappropriate language",
            (ProfanityDetected, Fr) => "Contient un langage inapproprié",
            (ProfanityDetected, De) => "Enthält unangemessene Sprache",

            (ProfileIncomplete, En) => "The firm profile is not ready for review",
            (ProfileIncomplete, Fr) => "Le profil de l'entreprise n'est pas prêt pour la revue",
            (ProfileIncomplete, De) => "Das Firmenprofil ist nicht bereit zur Prüfung",

            (OrderNotContiguous, En) => "Order values must be unique and run from 1 to {count}",
            (OrderNotContiguous, Fr) => {
                "Les valeurs d'ordre doivent être uniques et aller de 1 à {count}"
            }
            (OrderNotContiguous, De) => {
                "Reihenfolgewerte müssen eindeutig sein und von 1 bis {count} laufen"
            }

            (FieldRequired, En) => "This field is required",
            (FieldRequired, Fr) => "Ce champ est obligatoire",
            (FieldRequired, De) => "Dieses Feld ist erforderlich",

            (FirmUpdateSubject, En) => "Update on your firm {firm}",
            (FirmUpdateSubject, Fr) => "Mise à jour de votre entreprise {firm}",
            (FirmUpdateSubject, De) => "Neuigkeiten zu Ihrer Firma {firm}",

            (FirmApprovedBody, En) => "Your firm {firm} was approved and is now listed.",
            (FirmApprovedBody, Fr) => "Votre entreprise {firm} a été approuvée et est désormais publiée.",
            (FirmApprovedBody, De) => "Ihre Firma {firm} wurde genehmigt und ist jetzt gelistet.",

            (FirmRejectedBody, En) => "Your firm {firm} was not approved. Reason: {reason}",
            (FirmRejectedBody, Fr) => "Votre entreprise {firm} n'a pas été approuvée. Motif : {reason}",
            (FirmRejectedBody, De) => "Ihre Firma {firm} wurde nicht genehmigt. Grund: {reason}",

            (FirmSuspendedBody, En) => "Your firm {firm} has been suspended.",
            (FirmSuspendedBody, Fr) => "Votre entreprise {firm} a été suspendue.",
            (FirmSuspendedBody, De) => "Ihre Firma {firm} wurde gesperrt.",

            (FirmActivatedBody, En) => "Your firm {firm} is active again.",
            (FirmActivatedBody, Fr) => "Votre entreprise {firm} est de nouveau active.",
            (FirmActivatedBody, De) => "Ihre Firma {firm} ist wieder aktiv.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_is_translated_differently_per_language() {
        let keys = [
            MessageKey::AnswersInvalid,
            MessageKey::QuestionNotFound,
            MessageKey::OptionNotInQuestion,
            MessageKey::ProfanityDetected,
            MessageKey::OrderNotContiguous,
        ];
        for key in keys {
            let en = key.template(Language::En);
            let fr = key.template(Language::Fr);
            let de = key.template(Language::De);
            assert_ne!(en, fr);
            assert_ne!(en, de);
        }
    }
}
