use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{
    Identified, MataPelajaran, MataPelajaranInput, Student, StudentInput, Teacher, TeacherInput,
    UserAccount, UserSubmit,
};

/// The four list-backed resources managed from the admin section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Teachers,
    Students,
    MataPelajaran,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Users,
        Resource::Teachers,
        Resource::Students,
        Resource::MataPelajaran,
    ];

    /// Backend collection path, without leading slash
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Teachers => "teachers",
            Resource::Students => "students",
            Resource::MataPelajaran => "mata-pelajaran",
        }
    }

    /// Admin page slug, as in `/admin/dataguru`
    pub fn page_slug(&self) -> &'static str {
        match self {
            Resource::Users => "dataakun",
            Resource::Teachers => "dataguru",
            Resource::Students => "datamurid",
            Resource::MataPelajaran => "datamatapelajaran",
        }
    }

    pub fn from_page_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.page_slug() == slug)
    }

    /// Singular noun used in fallback error messages
    pub fn noun(&self) -> &'static str {
        match self {
            Resource::Users => "user",
            Resource::Teachers => "teacher",
            Resource::Students => "student",
            Resource::MataPelajaran => "mata pelajaran",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" | "user" | "akun" => Ok(Resource::Users),
            "teachers" | "teacher" | "guru" => Ok(Resource::Teachers),
            "students" | "student" | "murid" => Ok(Resource::Students),
            "mata-pelajaran" | "matapelajaran" | "subjects" => Ok(Resource::MataPelajaran),
            other => Err(format!("Unknown resource '{}'", other)),
        }
    }
}

/// A record type served by one backend resource, with its write payload
pub trait ResourceRecord: DeserializeOwned + Serialize + Identified + Clone + Send + Sync + 'static {
    const RESOURCE: Resource;
    type Input: DeserializeOwned + Serialize + Send + Sync;
}

impl ResourceRecord for UserAccount {
    const RESOURCE: Resource = Resource::Users;
    type Input = UserSubmit;
}

impl ResourceRecord for Teacher {
    const RESOURCE: Resource = Resource::Teachers;
    type Input = TeacherInput;
}

impl ResourceRecord for Student {
    const RESOURCE: Resource = Resource::Students;
    type Input = StudentInput;
}

impl ResourceRecord for MataPelajaran {
    const RESOURCE: Resource = Resource::MataPelajaran;
    type Input = MataPelajaranInput;
}
