pub mod domain;
pub mod ports;

pub use domain::{
    ChatMessage, ChatReply, Diagram, Difficulty, GroundingSource, MaterialKind, NewMaterial,
    NoteLength, Presentation, QuizQuestion, Sender, Slide, StudyMaterial, VideoScene,
};
pub use ports::{
    ChatContext, ChatService, ContentStore, DiagramService, ExplanationService, FieldUpdate,
    ImageService, NotesService, PortError, PortResult, ProgressSink, QuizService, SlideService,
    VideoService,
};
