/// Refused grouping operations. None of these change any state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GradeError {
    #[error("`{0}` is the overall average and cannot be merged or split")]
    AggregateRecord(String),

    #[error("No UE named `{0}`")]
    UnknownGroup(String),

    #[error("Cannot merge `{0}` with itself")]
    SameGroup(String),

    #[error("No module with id {0}")]
    UnknownModule(usize),
}
