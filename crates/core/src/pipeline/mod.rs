pub mod identify_faces_use_case;
pub mod teach_face_use_case;
