use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use rand::distributions::{Alphanumeric, DistString};
use serde::Serialize;
use thiserror::Error;

use crate::database::Conn;

use super::schema::persona;

/// Password assigned to every temporary guest account.
const GUEST_PASSWORD: &str = "GuestUqcloud";

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to find user `{0}`: {1}
    ByEmail(String, diesel::result::Error),
    /// Failed to create user: {0}
    Create(diesel::result::Error),
    /// Failed to delete user `{0}`: {1}
    Delete(String, diesel::result::Error),
    /// Failed to hash password: {0}
    HashPassword(bcrypt::BcryptError),
    /// User `{0}` has an unknown role `{1}`
    UnknownRole(String, String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ByEmail(_, diesel::result::Error::NotFound))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Role {
    Administrador,
    Estudiante,
    Invitado,
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct User {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Apellido")]
    pub surname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "Rol")]
    pub role: String,
}

impl User {
    pub async fn by_email(email: &str, conn: &mut Conn<'_>) -> Result<Self, Error> {
        persona::table
            .find(email)
            .get_result(conn)
            .await
            .map_err(|err| Error::ByEmail(email.to_string(), err))
    }

    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    pub fn role(&self) -> Result<Role, Error> {
        self.role
            .parse()
            .map_err(|_| Error::UnknownRole(self.email.clone(), self.role.clone()))
    }

    pub async fn delete(email: &str, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::delete(persona::table.find(email))
            .execute(conn)
            .await
            .map_err(|err| Error::Delete(email.to_string(), err))?;
        Ok(())
    }

    /// Registers a throwaway Invitado account with a random email and the
    /// fixed guest password.
    pub async fn create_guest(conn: &mut Conn<'_>) -> Result<Self, Error> {
        let email = guest_email();
        NewUser::new("Usuario", "Invitado", &email, GUEST_PASSWORD, Role::Invitado)?
            .create(conn)
            .await
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = persona)]
pub struct NewUser<'a> {
    #[diesel(column_name = nombre)]
    pub name: &'a str,
    #[diesel(column_name = apellido)]
    pub surname: &'a str,
    #[diesel(column_name = email)]
    pub email: &'a str,
    #[diesel(column_name = contrasenia)]
    pub password_hash: String,
    #[diesel(column_name = rol)]
    pub role: String,
}

impl<'a> NewUser<'a> {
    pub fn new(
        name: &'a str,
        surname: &'a str,
        email: &'a str,
        password: &str,
        role: Role,
    ) -> Result<Self, Error> {
        let password_hash =
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(Error::HashPassword)?;
        Ok(NewUser {
            name,
            surname,
            email,
            password_hash,
            role: role.to_string(),
        })
    }

    pub async fn create(self, conn: &mut Conn<'_>) -> Result<User, Error> {
        let email = self.email.to_string();
        diesel::insert_into(persona::table)
            .values(self)
            .execute(conn)
            .await
            .map_err(Error::Create)?;
        User::by_email(&email, conn).await
    }
}

fn guest_email() -> String {
    let local = Alphanumeric.sample_string(&mut rand::thread_rng(), 5);
    format!("{local}@temp.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_db_text() {
        for role in [Role::Administrador, Role::Estudiante, Role::Invitado] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("Profesor".parse::<Role>().is_err());
    }

    #[test]
    fn guest_emails_are_short_and_random() {
        let email = guest_email();
        let (local, domain) = email.split_once('@').unwrap();
        assert_eq!(domain, "temp.com");
        assert_eq!(local.len(), 5);
        assert!(local.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(guest_email(), email);
    }

    #[test]
    fn password_verification() {
        let hash = bcrypt::hash("pw", bcrypt::DEFAULT_COST).unwrap();
        let user = User {
            email: "a@b".into(),
            name: "A".into(),
            surname: "B".into(),
            password_hash: hash,
            role: Role::Estudiante.to_string(),
        };
        assert!(user.verify_password("pw"));
        assert!(!user.verify_password("bad"));
    }

    #[test]
    fn serialized_user_omits_the_password_hash() {
        let user = User {
            email: "a@b".into(),
            name: "A".into(),
            surname: "B".into(),
            password_hash: "secret".into(),
            role: Role::Estudiante.to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["Email"], "a@b");
        assert!(json.get("Contrasenia").is_none());
        assert!(json.to_string().find("secret").is_none());
    }
}
