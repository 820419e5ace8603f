use serde::{Deserialize, Serialize};

use super::reference::{Identified, Reference};

pub const KATEGORI_LIST: [&str; 10] = [
    "Matematika",
    "IPA",
    "IPS",
    "Bahasa Indonesia",
    "Bahasa Inggris",
    "Pendidikan Agama",
    "PPKN",
    "Seni Budaya",
    "Pendidikan Jasmani",
    "Prakarya",
];

/// The populated form of a subject's teacher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip: Option<String>,
}

impl Identified for TeacherSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Subject ("Mata Pelajaran")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MataPelajaran {
    #[serde(rename = "_id")]
    pub id: String,
    pub judul: String,
    pub deskripsi: String,
    pub tingkat_kelas: String,
    pub kategori: String,
    pub guru: Reference<TeacherSummary>,
}

impl MataPelajaran {
    pub fn guru_id(&self) -> &str {
        self.guru.id()
    }

    pub fn guru_name(&self) -> &str {
        self.guru.label(|t| t.full_name.as_str())
    }

    /// Edit payload for this subject, with the teacher collapsed to its id
    pub fn to_input(&self) -> MataPelajaranInput {
        MataPelajaranInput {
            judul: self.judul.clone(),
            deskripsi: self.deskripsi.clone(),
            tingkat_kelas: self.tingkat_kelas.clone(),
            kategori: self.kategori.clone(),
            guru: self.guru_id().to_string(),
        }
    }
}

impl Identified for MataPelajaran {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MataPelajaranInput {
    pub judul: String,
    pub deskripsi: String,
    pub tingkat_kelas: String,
    pub kategori: String,
    /// Teacher `_id`
    pub guru: String,
}

impl MataPelajaranInput {
    pub fn has_known_kategori(&self) -> bool {
        KATEGORI_LIST.contains(&self.kategori.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject(guru: serde_json::Value) -> MataPelajaran {
        serde_json::from_value(json!({
            "_id": "mp1",
            "judul": "Aljabar Dasar",
            "deskripsi": "Persamaan linear",
            "tingkatKelas": "VII",
            "kategori": "Matematika",
            "guru": guru
        }))
        .unwrap()
    }

    #[test]
    fn guru_as_bare_id() {
        let mp = subject(json!("t-42"));
        assert_eq!(mp.guru, Reference::Id("t-42".to_string()));
        assert_eq!(mp.guru_id(), "t-42");
        assert_eq!(mp.guru_name(), "Unknown");
    }

    #[test]
    fn guru_as_populated_record() {
        let mp = subject(json!({ "_id": "t-42", "fullName": "Pak Darto", "nip": "1987" }));
        assert_eq!(mp.guru_id(), "t-42");
        assert_eq!(mp.guru_name(), "Pak Darto");
        assert_eq!(mp.guru.expanded().and_then(|t| t.nip.as_deref()), Some("1987"));
    }

    #[test]
    fn edit_payload_sends_only_the_id() {
        let mp = subject(json!({ "_id": "t-7", "fullName": "Bu Ani" }));
        let input = mp.to_input();
        assert_eq!(input.guru, "t-7");
        assert!(input.has_known_kategori());
        assert_eq!(serde_json::to_value(&input).unwrap()["tingkatKelas"], "VII");
        assert_eq!(mp.guru.to_id(), Reference::Id("t-7".to_string()));
    }
}
