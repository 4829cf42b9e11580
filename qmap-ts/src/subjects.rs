//! Subject roster for the standardization batch
//!
//! One entry per question-bank table, iterated in order by the batch
//! worker. Table names are compile-time constants so they can be spliced
//! into SQL (identifiers cannot be bound as parameters).

/// One question-bank subject
#[derive(Debug, Clone, Copy)]
pub struct Subject {
    /// Backing table, always `<key>_questions`
    pub table_name: &'static str,
    /// Taxonomy subject key
    pub key: &'static str,
    /// Human-readable name for logs and the dashboard
    pub display_name: &'static str,
}

/// The full roster, in processing order
pub const SUBJECTS: &[Subject] = &[
    Subject { table_name: "anaesth_questions", key: "anaesth", display_name: "Anesthesia" },
    Subject { table_name: "anat_questions", key: "anat", display_name: "Anatomy" },
    Subject { table_name: "biochem_questions", key: "biochem", display_name: "Biochemistry" },
    Subject { table_name: "cardianae_questions", key: "cardianae", display_name: "Cardiac Anesthesia" },
    Subject { table_name: "cardio_questions", key: "cardio", display_name: "Cardiology" },
    Subject { table_name: "cvts_questions", key: "cvts", display_name: "CVTS" },
    Subject { table_name: "derma_questions", key: "derma", display_name: "Dermatology" },
    Subject { table_name: "em_questions", key: "em", display_name: "Emergency Medicine" },
    Subject { table_name: "endo_questions", key: "endo", display_name: "Endocrinology" },
    Subject { table_name: "ent_questions", key: "ent", display_name: "ENT" },
    Subject { table_name: "fmt_questions", key: "fmt", display_name: "Forensic Medicine" },
    Subject { table_name: "gastro_questions", key: "gastro", display_name: "Gastroenterology" },
    Subject { table_name: "genetics_questions", key: "genetics", display_name: "Genetics" },
    Subject { table_name: "hemat_questions", key: "hemat", display_name: "Hematology" },
    Subject { table_name: "hosp_questions", key: "hosp", display_name: "Hospital Admin" },
    Subject { table_name: "med_questions", key: "med", display_name: "Medicine" },
    Subject { table_name: "micro_questions", key: "micro", display_name: "Microbiology" },
    Subject { table_name: "nephro_questions", key: "nephro", display_name: "Nephrology" },
    Subject { table_name: "neuro_questions", key: "neuro", display_name: "Neurology" },
    Subject { table_name: "neuroane_questions", key: "neuroane", display_name: "Neuro Anesthesia" },
    Subject { table_name: "nm_questions", key: "nm", display_name: "Nuclear Medicine" },
    Subject { table_name: "ns_questions", key: "ns", display_name: "Neurosurgery" },
    Subject { table_name: "obgy_questions", key: "obgy", display_name: "OB/GYN" },
    Subject { table_name: "onco_questions", key: "onco", display_name: "Oncology" },
    Subject { table_name: "oph_questions", key: "oph", display_name: "Ophthalmology" },
    Subject { table_name: "ortho_questions", key: "ortho", display_name: "Orthopedics" },
    Subject { table_name: "patho_questions", key: "patho", display_name: "Pathology" },
    Subject { table_name: "ped_questions", key: "ped", display_name: "Pediatrics" },
    Subject { table_name: "pharma_questions", key: "pharma", display_name: "Pharmacology" },
    Subject { table_name: "physio_questions", key: "physio", display_name: "Physiology" },
    Subject { table_name: "pmr_questions", key: "pmr", display_name: "PMR" },
    Subject { table_name: "ps_questions", key: "ps", display_name: "Plastic Surgery" },
    Subject { table_name: "psm_questions", key: "psm", display_name: "PSM" },
    Subject { table_name: "psych_questions", key: "psych", display_name: "Psychiatry" },
    Subject { table_name: "radio_questions", key: "radio", display_name: "Radiology" },
    Subject { table_name: "rheumat_questions", key: "rheumat", display_name: "Rheumatology" },
    Subject { table_name: "surg_questions", key: "surg", display_name: "Surgery" },
    Subject { table_name: "tbc_questions", key: "tbc", display_name: "TB & Chest" },
    Subject { table_name: "uro_questions", key: "uro", display_name: "Urology" },
    Subject { table_name: "vs_questions", key: "vs", display_name: "Vascular Surgery" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_size() {
        assert_eq!(SUBJECTS.len(), 40);
    }

    #[test]
    fn test_table_naming_convention() {
        for subject in SUBJECTS {
            assert_eq!(
                subject.table_name,
                format!("{}_questions", subject.key),
                "table for {} should follow the <key>_questions convention",
                subject.key
            );
        }
    }

    #[test]
    fn test_keys_unique() {
        let mut keys: Vec<&str> = SUBJECTS.iter().map(|s| s.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), SUBJECTS.len());
    }
}
