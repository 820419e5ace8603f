pub mod page;
pub mod profile;
pub mod reference;
pub mod student;
pub mod subject;
pub mod teacher;
pub mod user;

pub use page::{ListPage, PageInfo};
pub use profile::{Profile, ProfileUpdate};
pub use reference::{Identified, Reference};
pub use student::{Student, StudentInput, KELAS_LIST};
pub use subject::{MataPelajaran, MataPelajaranInput, TeacherSummary, KATEGORI_LIST};
pub use teacher::{Teacher, TeacherInput};
pub use user::{UserAccount, UserSubmit};
