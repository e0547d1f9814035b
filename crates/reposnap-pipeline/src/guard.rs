//! Repository name guard
//!
//! Owners and names end up as path components and as arguments to external
//! processes. Anything that could be interpreted by a shell or escape the
//! destination directory is refused up front.

use crate::error::UnsafeName;
use reposnap_core::RepositoryDescriptor;

/// Characters refused in owners and names
pub const FORBIDDEN_CHARACTERS: [char; 5] = [';', '|', '&', '/', '\\'];

/// Check a descriptor before it reaches the archiver
///
/// # Errors
/// `UnsafeName` describing the first offending field
pub fn validate_descriptor(repo: &RepositoryDescriptor) -> Result<(), UnsafeName> {
    check_component(&repo.full_name, "owner", &repo.owner)?;
    check_component(&repo.full_name, "name", &repo.name)
}

fn check_component(repository: &str, field: &'static str, value: &str) -> Result<(), UnsafeName> {
    if value.is_empty() {
        return Err(UnsafeName::Empty {
            repository: repository.to_string(),
            field,
        });
    }
    if let Some(character) = value.chars().find(|c| FORBIDDEN_CHARACTERS.contains(c) || *c == '\0') {
        return Err(UnsafeName::ForbiddenCharacter {
            repository: repository.to_string(),
            field,
            character,
        });
    }
    if value == "." || value == ".." {
        return Err(UnsafeName::RelativeComponent {
            repository: repository.to_string(),
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for (owner, name) in [("acme", "widgets"), ("me", "dot.files"), ("a-b", "c_d.rs")] {
            assert!(validate_descriptor(&RepositoryDescriptor::new(owner, name)).is_ok());
        }
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for bad in ["x;rm -rf", "a|b", "a&&b"] {
            let err = validate_descriptor(&RepositoryDescriptor::new("acme", bad)).unwrap_err();
            assert!(matches!(err, UnsafeName::ForbiddenCharacter { field: "name", .. }));

            let err = validate_descriptor(&RepositoryDescriptor::new(bad, "widgets")).unwrap_err();
            assert!(matches!(err, UnsafeName::ForbiddenCharacter { field: "owner", .. }));
        }
    }

    #[test]
    fn rejects_path_escapes() {
        let err = validate_descriptor(&RepositoryDescriptor::new("..", "widgets")).unwrap_err();
        assert!(matches!(err, UnsafeName::RelativeComponent { .. }));

        let err = validate_descriptor(&RepositoryDescriptor::new("acme", "a/b")).unwrap_err();
        assert_eq!(
            err,
            UnsafeName::ForbiddenCharacter {
                repository: "acme/a/b".to_string(),
                field: "name",
                character: '/',
            }
        );

        let err = validate_descriptor(&RepositoryDescriptor::new("", "widgets")).unwrap_err();
        assert!(matches!(err, UnsafeName::Empty { field: "owner", .. }));
    }
}
